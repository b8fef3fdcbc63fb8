use actix_web::{
    get, post,
    web::{self, Path, ServiceConfig},
    HttpRequest, HttpResponse, Result,
};
use chrono::Local;
use deadpool_postgres::Pool;
use serde::Deserialize;
use serde_json::json;

use super::store::{self, NewAppointment, NEWEST_FIRST};
use super::{commit, load_owned, Action, Actor, Slot};
use crate::audit::{AuditEvent, AuditSink};
use crate::db::Filter;
use crate::doctor::get_active_doctor;
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::SessionUser;

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(book_appointment);
    cfg.service(my_appointments);
    cfg.service(
        web::resource("/dashboard/patient/appointments/{id}/cancel")
            .route(web::post().to(cancel_appointment))
            .default_service(web::to(post_required)),
    );
    cfg.service(reschedule_form);
    cfg.service(reschedule_appointment);
}

#[derive(Deserialize)]
pub struct BookingForm {
    department: Option<String>,
    hospital: Option<String>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    time: String,
    symptoms: Option<String>,
}

#[post("/dashboard/patient/book/{doctor_id}")]
async fn book_appointment(
    path: Path<i32>,
    user: SessionUser,
    booking_form: web::Json<BookingForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let booking_form = booking_form.into_inner();
    let doctor_id = path.into_inner();
    let db_conn = db_pool.get().await?;

    let doctor = get_active_doctor(&db_conn, doctor_id).await?;
    let slot = Slot::future(
        &booking_form.date,
        &booking_form.time,
        Local::now().naive_local(),
    )?;

    let new = NewAppointment {
        patient_id: user.id,
        doctor_id: doctor.id,
        department: non_blank(&booking_form.department)
            .unwrap_or(doctor.specialization.as_str())
            .to_string(),
        hospital: non_blank(&booking_form.hospital)
            .unwrap_or(doctor.hospital.as_str())
            .to_string(),
        date: slot.date,
        time: slot.time,
        symptoms: non_blank(&booking_form.symptoms).unwrap_or_default().to_string(),
    };
    let appointment = store::insert(&db_conn, &new).await?;
    let view = store::get_view(&db_conn, appointment.id).await?;
    audit
        .record(AuditEvent::appointment_created(&view).from_request(&req))
        .await;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Appointment booked successfully!",
        "id": appointment.id,
        "code": appointment.code(),
    })))
}

#[get("/dashboard/patient/appointments")]
async fn my_appointments(
    user: SessionUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let mut filter = Filter::new();
    filter.push("a.patient_id = ?", user.id);
    let appointments = store::list(&db_conn, &filter, NEWEST_FIRST, None).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn cancel_appointment(
    path: Path<i32>,
    user: SessionUser,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let actor = Actor::Patient(user.id);
    let appointment = load_owned(&db_conn, path.into_inner(), actor).await?;
    let view = commit(&db_conn, audit.get_ref(), &req, &appointment, actor, Action::Cancel).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "message": "Appointment cancelled.",
        "appointment": view,
    })))
}

async fn post_required() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

#[derive(Deserialize)]
pub struct SlotForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
}

#[get("/dashboard/patient/appointments/{id}/reschedule")]
async fn reschedule_form(
    path: Path<i32>,
    user: SessionUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let appointment = load_owned(&db_conn, path.into_inner(), Actor::Patient(user.id)).await?;
    let view = store::get_view(&db_conn, appointment.id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/dashboard/patient/appointments/{id}/reschedule")]
async fn reschedule_appointment(
    path: Path<i32>,
    user: SessionUser,
    slot_form: web::Json<SlotForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let actor = Actor::Patient(user.id);
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
