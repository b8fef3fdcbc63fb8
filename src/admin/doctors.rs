use actix_web::{
    get, post,
    web::{self, ServiceConfig},
    HttpRequest, HttpResponse, Result,
};
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use super::delete_cascading;
use crate::audit::{AuditEvent, AuditSink};
use crate::db::Filter;
use crate::doctor::review::{self, ManageAction, ReviewAction};
use crate::doctor::{get_doctor, list_doctors, set_status, DoctorStatus, DOCTOR_SEARCH};
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::Staff;

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(doctor_applications);
    cfg.service(pending_doctors);
    cfg.service(review_doctor);
    cfg.service(manage_doctors);
    cfg.service(update_doctor);
}

fn pending_filter() -> Filter {
    let mut filter = Filter::new();
    filter.push("d.status = ?", DoctorStatus::Pending);
    filter
}

#[get("/dabs-admin/doctors/applications")]
async fn doctor_applications(
    _staff: Staff,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let doctors = list_doctors(&db_conn, &pending_filter()).await?;
    Ok(HttpResponse::Ok().json(doctors))
}

#[get("/dabs-admin/doctors/pending")]
async fn pending_doctors(
    _staff: Staff,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let doctors = list_doctors(&db_conn, &pending_filter()).await?;
    Ok(HttpResponse::Ok().json(doctors))
}

#[derive(Deserialize)]
pub struct ReviewForm {
    doctor_id: i32,
    action: ReviewAction,
}

#[post("/dabs-admin/doctors/pending")]
async fn review_doctor(
    staff: Staff,
    form: web::Json<ReviewForm>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let doctor = get_doctor(&db_conn, form.doctor_id).await?;
    let next = review::review(doctor.status, form.action)?;
    let updated = db_conn
        .execute(
            "UPDATE doctor_profiles SET status = $1 WHERE id = $2 AND status = $3",
            &[&next, &doctor.id, &DoctorStatus::Pending],
        )
        .await?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    log::info!("staff {} set doctor profile {} to {:?}", staff.0.id, doctor.id, next);

    let verb = match form.action {
        ReviewAction::Approve => "approved",
        ReviewAction::Reject => "rejected",
    };
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": format!("Doctor {} {}.", doctor.name, verb),
    })))
}

#[derive(Deserialize)]
pub struct DoctorsQuery {
    q: Option<String>,
    status: Option<String>,
}

#[get("/dabs-admin/doctors")]
async fn manage_doctors(
    _staff: Staff,
    query: web::Query<DoctorsQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let mut filter = Filter::new();
    if let Some(q) = non_blank(&query.q) {
        filter.search(&DOCTOR_SEARCH, q);
    }
    if let Some(status) = non_blank(&query.status) {
        let status: DoctorStatus = status
            .parse()
            .map_err(|_| AppError::validation("Unknown doctor status."))?;
        filter.push("d.status = ?", status);
    }
    let db_conn = db_pool.get().await?;
    let doctors = list_doctors(&db_conn, &filter).await?;
    Ok(HttpResponse::Ok().json(doctors))
}

#[derive(Deserialize)]
pub struct ManageForm {
    doctor_id: i32,
    action: ManageAction,
}

#[post("/dabs-admin/doctors")]
async fn update_doctor(
    staff: Staff,
    form: web::Json<ManageForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let mut db_conn = db_pool.get().await?;
    let doctor = get_doctor(&db_conn, form.doctor_id).await?;

    let message = match review::manage(form.action) {
        Some(status) => {
            set_status(&db_conn, doctor.id, status).await?;
            format!("Doctor {} set to {:?}.", doctor.name, status)
        }
        None => {
            let removed = delete_cascading(
                &mut db_conn,
                "a.doctor_id",
                "DELETE FROM doctor_profiles WHERE id = $1",
                doctor.id,
            )
            .await?;
            log::info!(
                "staff {} deleted doctor profile {} with {} appointments",
                staff.0.id,
                doctor.id,
                removed.len()
            );
            for view in &removed {
                audit
                    .record(AuditEvent::appointment_deleted(view).by(staff.0.id).from_request(&req))
                    .await;
            }
            format!("Doctor {} deleted.", doctor.name)
        }
    };

    Ok(HttpResponse::Ok().json(json!({"status": "ok", "message": message})))
}
