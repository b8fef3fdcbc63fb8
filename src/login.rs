use actix_session::Session;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Result};
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use crate::accounts::{find_by_username, verify_password};
use crate::audit::{AuditEvent, AuditSink};
use crate::doctor::doctor_id_for_user;
use crate::error::AppError;
use crate::identity::{Role, SessionUser};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(login);
    cfg.service(get_me);
    cfg.service(route_after_login);
    cfg.service(
        web::resource("/logout")
            .route(web::get().to(logout))
            .route(web::post().to(logout)),
    );
}

#[get("/me")]
async fn get_me(user: SessionUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "id": user.id,
        "username": user.username,
        "role": user.role,
        "doctorId": user.doctor_id,
    })))
}

#[get("/route")]
async fn route_after_login(user: SessionUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "route": user.role.dashboard()})))
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[post("/login")]
async fn login(
    credentials: web::Json<Credentials>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    session: Session,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let credentials = credentials.into_inner();
    let db_conn = db_pool.get().await?;

    let account = find_by_username(&db_conn, &credentials.username)
        .await?
        .filter(|account| account.is_active)
        .filter(|account| verify_password(&credentials.password, &account.hsecret));
    let account = match account {
        Some(account) => account,
        None => {
            audit
                .record(AuditEvent::login_failed(credentials.username.trim()).from_request(&req))
                .await;
            return Err(AppError::InvalidCredentials);
        }
    };

    let doctor_id = doctor_id_for_user(&db_conn, account.id).await?;
    let user = SessionUser {
        id: account.id,
        username: account.username.clone(),
        role: Role::resolve(account.is_staff, doctor_id),
        doctor_id,
    };
    user.store(&session)?;
    audit
        .record(AuditEvent::login(user.id, &user.username).from_request(&req))
        .await;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "id": user.id,
        "role": user.role,
        "route": user.role.dashboard(),
    })))
}

async fn logout(
    session: Session,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    if let Some(user) = SessionUser::load(&session)? {
        audit
            .record(AuditEvent::logout(user.id, &user.username).from_request(&req))
            .await;
    }
    session.purge();
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "route": "/"})))
}
