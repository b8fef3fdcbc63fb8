use actix_web::{
    get,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use chrono::Local;
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_postgres::row::Row;

use super::{get_doctor, list_doctors, DoctorStatus};
use crate::appointments::display_name;
use crate::db::Filter;
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::{DoctorUser, SessionUser};

const FIND_SEARCH: [&str; 5] = [
    "u.first_name",
    "u.last_name",
    "d.specialization",
    "d.hospital",
    "d.city",
];

const PATIENT_SEARCH: [&str; 4] = ["u.first_name", "u.last_name", "u.username", "u.email"];

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(find_doctors);
    cfg.service(doctor_dashboard);
    cfg.service(doctor_patients);
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[get("/dashboard/patient/find")]
async fn find_doctors(
    _user: SessionUser,
    query: web::Query<SearchQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let mut filter = Filter::new();
    filter.push("d.status = ?", DoctorStatus::Active);
    if let Some(q) = non_blank(&query.q) {
        filter.search(&FIND_SEARCH, q);
    }
    let db_conn = db_pool.get().await?;
    let doctors = list_doctors(&db_conn, &filter).await?;
    Ok(HttpResponse::Ok().json(doctors))
}

#[get("/dashboard/doctor")]
async fn doctor_dashboard(
    doctor: DoctorUser,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let profile = get_doctor(&db_conn, doctor.profile_id).await?;
    let today = Local::now().date_naive();
    let row = db_conn
        .query_one(
            "SELECT COUNT(*) FILTER (WHERE date = $2) AS today_appointments,
                    COUNT(*) FILTER (WHERE status = 'Pending') AS pending_approvals,
                    COUNT(DISTINCT patient_id) AS total_patients
             FROM appointments WHERE doctor_id = $1",
            &[&doctor.profile_id, &today],
        )
        .await?;
    let today_appointments: i64 = row.get("today_appointments");
    let pending_approvals: i64 = row.get("pending_approvals");
    let total_patients: i64 = row.get("total_patients");
    Ok(HttpResponse::Ok().json(json!({
        "profile": profile,
        "todayAppointments": today_appointments,
        "pendingApprovals": pending_approvals,
        "totalPatients": total_patients,
    })))
}

/// A patient seen by one doctor, with how often.
#[derive(Debug, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PatientSummary {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub total_appointments: i64,
}

impl From<&Row> for PatientSummary {
    fn from(row: &Row) -> Self {
        let username: String = row.get("username");
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        PatientSummary {
            id: row.get("id"),
            name: display_name(&first_name, &last_name, &username),
            username,
            email: row.get("email"),
            phone: row.get("phone"),
            total_appointments: row.get("total_appointments"),
        }
    }
}

#[get("/dashboard/doctor/patients")]
async fn doctor_patients(
    doctor: DoctorUser,
    query: web::Query<SearchQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let mut filter = Filter::new();
    filter.push("a.doctor_id = ?", doctor.profile_id);
    if let Some(q) = non_blank(&query.q) {
        filter.search(&PATIENT_SEARCH, q);
    }
    let sql = format!(
        "SELECT u.id, u.username, u.first_name, u.last_name, u.email, u.phone,
                COUNT(a.id) AS total_appointments
         FROM users u JOIN appointments a ON a.patient_id = u.id{}
         GROUP BY u.id ORDER BY u.first_name, u.last_name, u.id",
        filter.where_clause()
    );
    let db_conn = db_pool.get().await?;
    let patients: Vec<PatientSummary> = db_conn
        .query(sql.as_str(), &filter.params())
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    Ok(HttpResponse::Ok().json(patients))
}
