use actix_web::{web::ServiceConfig, HttpRequest};
use chrono::Local;
use deadpool_postgres::Client;

use crate::audit::{AuditEvent, AuditSink};
use crate::error::AppError;

mod approvals;
mod booking;
mod models;
pub mod store;
pub mod workflow;

pub use models::{appointment_code, display_name, Appointment, AppointmentStatus, AppointmentView};
pub use workflow::{Action, Actor, Slot, WorkflowError};

pub fn config(cfg: &mut ServiceConfig) {
    booking::config(cfg);
    approvals::config(cfg);
}

/// Loads appointment `id`, refusing actors that do not own it.
async fn load_owned(db_conn: &Client, id: i32, actor: Actor) -> Result<Appointment, AppError> {
    let appointment = store::get(db_conn, id).await?;
    workflow::authorize(&appointment, actor)?;
    Ok(appointment)
}

/// Plans and writes one transition, then records it.
async fn commit(
    db_conn: &Client,
    audit: &dyn AuditSink,
    req: &HttpRequest,
    appointment: &Appointment,
    actor: Actor,
    action: Action,
) -> Result<AppointmentView, AppError> {
    let now = Local::now().naive_local();
    let transition = workflow::plan(appointment, actor, action, now)?;
    store::apply(db_conn, &transition).await?;
    let view = store::get_view(db_conn, appointment.id).await?;
    log::info!(
        "appointment {} {} -> {} by {:?}",
        appointment.id,
        transition.expected,
        transition.next,
        actor
    );
    audit
        .record(AuditEvent::appointment_updated(&view).from_request(req))
        .await;
    Ok(view)
}
