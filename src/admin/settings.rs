use actix_web::{
    get, post,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use deadpool_postgres::Pool;
use serde_json::json;

use crate::error::AppError;
use crate::identity::Staff;
use crate::settings::{SettingsForm, SystemSettings};

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(get_settings);
    cfg.service(update_settings);
}

#[get("/dabs-admin/settings")]
async fn get_settings(
    _staff: Staff,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let settings = SystemSettings::load(&db_conn).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[post("/dabs-admin/settings")]
async fn update_settings(
    staff: Staff,
    form: web::Json<SettingsForm>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let mut settings = SystemSettings::load(&db_conn).await?;
    settings.apply(form.into_inner(), staff.0.id);
    settings.save(&db_conn).await?;
    log::info!("staff {} updated system settings", staff.0.id);
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Settings updated successfully.",
        "settings": settings,
    })))
}
