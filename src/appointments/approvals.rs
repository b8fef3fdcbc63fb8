use actix_web::{
    get, post,
    web::{self, Path, ServiceConfig},
    HttpRequest, HttpResponse, Result,
};
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use super::booking::SlotForm;
use super::models::AppointmentStatus;
use super::store::{self, NEWEST_FIRST, OLDEST_FIRST};
use super::{commit, load_owned, Action, Actor, Slot};
use crate::audit::AuditSink;
use crate::db::Filter;
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::DoctorUser;

/// Search columns of the doctor's appointment list.
const DOCTOR_SEARCH: [&str; 4] = ["p.first_name", "p.last_name", "p.username", "a.symptoms"];

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(pending_approvals);
    cfg.service(approve_appointment);
    cfg.service(reject_appointment);
    cfg.service(doctor_reschedule_form);
    cfg.service(doctor_reschedule);
    cfg.service(doctor_appointments);
    cfg.service(update_doctor_appointment);
}

#[get("/dashboard/doctor/approvals")]
async fn pending_approvals(
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let mut filter = Filter::new();
    filter.push("a.doctor_id = ?", doctor.profile_id);
    filter.push("a.status = ?", AppointmentStatus::Pending);
    let appointments = store::list(&db_conn, &filter, OLDEST_FIRST, None).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn decide(
    id: i32,
    doctor: &DoctorUser,
    action: Action,
    db_pool: &Pool,
    audit: &dyn AuditSink,
    req: &HttpRequest,
) -> Result<super::AppointmentView, AppError> {
    let db_conn = db_pool.get().await?;
    let actor = Actor::Doctor(doctor.profile_id);
    let appointment = load_owned(&db_conn, id, actor).await?;
    commit(&db_conn, audit, req, &appointment, actor, action).await
}

#[post("/dashboard/doctor/approvals/{id}/approve")]
async fn approve_appointment(
    path: Path<i32>,
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let view = decide(path.into_inner(), &doctor, Action::Approve, &db_pool, audit.get_ref(), &req).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Appointment approved.",
        "appointment": view,
    })))
}

#[post("/dashboard/doctor/approvals/{id}/reject")]
async fn reject_appointment(
    path: Path<i32>,
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let view = decide(path.into_inner(), &doctor, Action::Reject, &db_pool, audit.get_ref(), &req).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Appointment rejected.",
        "appointment": view,
    })))
}

#[get("/dashboard/doctor/approvals/{id}/reschedule")]
async fn doctor_reschedule_form(
    path: Path<i32>,
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let appointment = load_owned(&db_conn, path.into_inner(), Actor::Doctor(doctor.profile_id)).await?;
    let view = store::get_view(&db_conn, appointment.id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/dashboard/doctor/approvals/{id}/reschedule")]
async fn doctor_reschedule(
    path: Path<i32>,
    doctor: DoctorUser,
    slot_form: web::Json<SlotForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let actor = Actor::Doctor(doctor.profile_id);
    let appointment = load_owned(&db_conn, path.into_inner(), actor).await?;
    let slot = Slot::parse(&slot_form.date, &slot_form.time)?;
    let view = commit(
        &db_conn,
        audit.get_ref(),
        &req,
        &appointment,
        actor,
        Action::Reschedule(slot),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Appointment rescheduled.",
        "appointment": view,
    })))
}

#[derive(Deserialize)]
pub struct DoctorAppointmentsQuery {
    q: Option<String>,
    status: Option<String>,
}

#[get("/dashboard/doctor/appointments")]
async fn doctor_appointments(
    doctor: DoctorUser,
    query: web::Query<DoctorAppointmentsQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let mut filter = Filter::new();
    filter.push("a.doctor_id = ?", doctor.profile_id);
    if let Some(q) = non_blank(&query.q) {
        filter.search(&DOCTOR_SEARCH, q);
    }
    if let Some(status) = non_blank(&query.status) {
        let status: AppointmentStatus = status
            .parse()
            .map_err(|_| AppError::validation("Unknown appointment status."))?;
        filter.push("a.status = ?", status);
    }

    let db_conn = db_pool.get().await?;
    let appointments = store::list(&db_conn, &filter, NEWEST_FIRST, None).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UpcomingAction {
    Complete,
    Cancel,
}

#[derive(Deserialize)]
pub struct UpcomingForm {
    appointment_id: i32,
    action: UpcomingAction,
}

#[post("/dashboard/doctor/appointments")]
async fn update_doctor_appointment(
    doctor: DoctorUser,
    form: web::Json<UpcomingForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let (action, message) = match form.action {
        UpcomingAction::Complete => (Action::Complete, "Appointment marked as completed."),
        UpcomingAction::Cancel => (Action::Cancel, "Appointment cancelled."),
    };
    let view = decide(form.appointment_id, &doctor, action, &db_pool, audit.get_ref(), &req).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": message,
        "appointment": view,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Role, SessionUser};
    use actix_session::Session;
    use actix_web::{http::StatusCode, test, App};
    use deadpool_postgres::{Config, Runtime};
    use tokio_postgres::NoTls;

    async fn sign_in_patient(session: Session) -> Result<HttpResponse, AppError> {
        let user = SessionUser {
            id: 21,
            username: "pat@example.org".into(),
            role: Role::Patient,
            doctor_id: None,
        };
        user.store(&session)?;
        Ok(HttpResponse::Ok().finish())
    }

    #[actix_rt::test]
    async fn patients_cannot_reach_doctor_routes() {
        let mut cfg = Config::default();
        cfg.host = Some("127.0.0.1".to_string());
        cfg.port = Some(1);
        cfg.dbname = Some("dabs".to_string());
        let db_pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls).unwrap();
        let app = test::init_service(
            App::new()
                .wrap(crate::session_middleware(&[3; 64]))
                .app_data(web::Data::new(db_pool))
                .route("/test/sign-in", web::post().to(sign_in_patient))
                .configure(config),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/test/sign-in").to_request(),
        )
        .await;
        let cookie = resp.response().cookies().next().unwrap().into_owned();

        let req = test::TestRequest::get()
            .uri("/dashboard/doctor/approvals")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
