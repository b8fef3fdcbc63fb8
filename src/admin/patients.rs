use actix_web::{
    get, post,
    web::{self, ServiceConfig},
    HttpRequest, HttpResponse, Result,
};
use deadpool_postgres::{Client, Pool};
use serde::Deserialize;
use serde_json::json;

use super::delete_cascading;
use crate::accounts::Account;
use crate::audit::{AuditEvent, AuditSink};
use crate::db::Filter;
use crate::doctor::review::ManageAction;
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::Staff;

const PATIENT_SEARCH: [&str; 4] = ["u.first_name", "u.last_name", "u.username", "u.email"];

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(list_patients);
    cfg.service(update_patient);
}

/// Accounts that are neither staff nor doctors.
fn patients_only() -> Filter {
    let mut filter = Filter::new();
    filter.require("NOT u.is_staff");
    filter.require("NOT EXISTS (SELECT 1 FROM doctor_profiles d WHERE d.user_id = u.id)");
    filter
}

async fn query_patients(db_conn: &Client, filter: &Filter) -> Result<Vec<Account>, AppError> {
    let sql = format!(
        "SELECT u.* FROM users u{} ORDER BY u.first_name, u.last_name, u.username",
        filter.where_clause()
    );
    let patients: Vec<Account> = db_conn
        .query(sql.as_str(), &filter.params())
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    Ok(patients)
}

#[derive(Deserialize)]
pub struct PatientsQuery {
    q: Option<String>,
}

#[get("/dabs-admin/patients")]
async fn list_patients(
    _staff: Staff,
    query: web::Query<PatientsQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let mut filter = patients_only();
    if let Some(q) = non_blank(&query.q) {
        filter.search(&PATIENT_SEARCH, q);
    }
    let db_conn = db_pool.get().await?;
    let patients = query_patients(&db_conn, &filter).await?;
    Ok(HttpResponse::Ok().json(patients))
}

#[derive(Deserialize)]
pub struct PatientActionForm {
    patient_id: i32,
    action: ManageAction,
}

/// Audit line for an action on `name`.
fn action_message(action: ManageAction, name: &str, id: i32) -> String {
    let verb = match action {
        ManageAction::Activate => "Activated",
        ManageAction::Deactivate => "Deactivated",
        ManageAction::Delete => "Deleted",
    };
    format!("{} patient {} (id={})", verb, name, id)
}

#[post("/dabs-admin/patients")]
async fn update_patient(
    staff: Staff,
    form: web::Json<PatientActionForm>,
    db_pool: web::Data<Pool>,
    audit: web::Data<dyn AuditSink>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let mut db_conn = db_pool.get().await?;
    let mut filter = patients_only();
    filter.push("u.id = ?", form.patient_id);
    let patient = query_patients(&db_conn, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)?;
    let name = patient.full_name();

    let message = match form.action {
        ManageAction::Activate | ManageAction::Deactivate => {
            let active = form.action == ManageAction::Activate;
            db_conn
                .execute(
                    "UPDATE users SET is_active = $1 WHERE id = $2",
                    &[&active, &patient.id],
                )
                .await?;
            let state = if active { "Active" } else { "Inactive" };
            format!("Patient {} set to {}.", name, state)
        }
        ManageAction::Delete => {
            let removed = delete_cascading(
                &mut db_conn,
                "a.patient_id",
                "DELETE FROM users WHERE id = $1",
                patient.id,
            )
            .await?;
            for view in &removed {
                audit
                    .record(AuditEvent::appointment_deleted(view).by(staff.0.id).from_request(&req))
                    .await;
            }
            format!("Patient {} deleted.", name)
        }
    };

    log::info!("staff {} {:?} patient {}", staff.0.id, form.action, patient.id);
    audit
        .record(
            AuditEvent::admin_action(staff.0.id, action_message(form.action, &name, patient.id))
                .from_request(&req),
        )
        .await;
    Ok(HttpResponse::Ok().json(json!({"status": "ok", "message": message})))
}
