use deadpool_postgres::{Client, Transaction};

use crate::db::Filter;
use crate::error::AppError;

mod dashboard;
mod models;
pub mod review;
mod schedule;

pub use models::{Doctor, DoctorStatus, Schedule, DOCTOR_SELECT};

pub const BY_NAME: &str = " ORDER BY u.first_name, u.last_name, d.id";

/// Columns a doctor search matches against.
pub const DOCTOR_SEARCH: [&str; 6] = [
    "u.first_name",
    "u.last_name",
    "u.email",
    "d.specialization",
    "d.hospital",
    "d.city",
];

pub fn config(cfg: &mut actix_web::web::ServiceConfig) {
    dashboard::config(cfg);
    schedule::config(cfg);
}

pub async fn get_doctor(db_conn: &Client, id: i32) -> Result<Doctor, AppError> {
    let sql = format!("{} WHERE d.id = $1", DOCTOR_SELECT);
    db_conn
        .query_opt(sql.as_str(), &[&id])
        .await?
        .map(|row| Doctor::from(&row))
        .ok_or(AppError::NotFound)
}

/// A doctor patients may see and book.
pub async fn get_active_doctor(db_conn: &Client, id: i32) -> Result<Doctor, AppError> {
    let doctor = get_doctor(db_conn, id).await?;
    if doctor.status == DoctorStatus::Active {
        Ok(doctor)
    } else {
        Err(AppError::NotFound)
    }
}

pub async fn doctor_id_for_user(db_conn: &Client, user_id: i32) -> Result<Option<i32>, AppError> {
    let row = db_conn
        .query_opt("SELECT id FROM doctor_profiles WHERE user_id = $1", &[&user_id])
        .await?;
    Ok(row.map(|row| row.get("id")))
}

pub async fn list_doctors(db_conn: &Client, filter: &Filter) -> Result<Vec<Doctor>, AppError> {
    let sql = format!("{}{}{}", DOCTOR_SELECT, filter.where_clause(), BY_NAME);
    let doctors: Vec<Doctor> = db_conn
        .query(sql.as_str(), &filter.params())
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    Ok(doctors)
}

pub async fn set_status(db_conn: &Client, id: i32, status: DoctorStatus) -> Result<(), AppError> {
    let updated = db_conn
        .execute(
            "UPDATE doctor_profiles SET status = $1 WHERE id = $2",
            &[&status, &id],
        )
        .await?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    log::info!("doctor profile {} is now {:?}", id, status);
    Ok(())
}

/// Profile fields captured at self-registration.
pub struct NewProfile {
    pub registration_no: String,
    pub specialization: String,
    pub experience_years: i32,
    pub hospital: String,
    pub city: String,
    pub slot_preference: String,
    pub fee: Option<f64>,
    pub bio: String,
}

impl NewProfile {
    /// Experience that is not a non-negative whole number counts as 0.
    pub fn experience(raw: Option<&str>) -> i32 {
        raw.and_then(|value| value.trim().parse::<i32>().ok())
            .filter(|years| *years >= 0)
            .unwrap_or(0)
    }

    pub fn fee(raw: Option<&str>) -> Option<f64> {
        raw.and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|fee| fee.is_finite())
    }
}

/// Inserts a Pending profile for `user_id` and returns its id.
pub async fn create_profile(
    txn: &Transaction<'_>,
    user_id: i32,
    profile: &NewProfile,
) -> Result<i32, AppError> {
    let row = txn
        .query_one(
            "INSERT INTO doctor_profiles
                (user_id, registration_no, specialization, experience_years, hospital, city,
                 slot_preference, fee, bio, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
            &[
                &user_id,
                &profile.registration_no,
                &profile.specialization,
                &profile.experience_years,
                &profile.hospital,
                &profile.city,
                &profile.slot_preference,
                &profile.fee,
                &profile.bio,
                &DoctorStatus::Pending,
            ],
        )
        .await?;
    Ok(row.get("id"))
}
