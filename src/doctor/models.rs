use chrono::prelude::*;
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::row::Row;

use crate::appointments::display_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSql, FromSql)]
#[postgres(name = "doctor_status")]
pub enum DoctorStatus {
    Pending,
    Active,
    Inactive,
}

impl std::str::FromStr for DoctorStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(DoctorStatus::Pending),
            "active" => Ok(DoctorStatus::Active),
            "inactive" => Ok(DoctorStatus::Inactive),
            _ => Err(()),
        }
    }
}

/// Columns every doctor query selects: the profile plus its account's
/// identity fields.
pub const DOCTOR_SELECT: &str = "SELECT d.*, u.username, u.first_name, u.last_name, u.email, u.is_active
    FROM doctor_profiles d JOIN users u ON u.id = d.user_id";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Doctor {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub account_active: bool,
    pub registration_no: String,
    pub specialization: String,
    pub experience_years: i32,
    pub hospital: String,
    pub city: String,
    pub slot_preference: String,
    pub fee: Option<f64>,
    pub bio: String,
    pub status: DoctorStatus,
    pub schedule: Schedule,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Schedule {
    pub working_days: String,
    pub clinic_start_time: Option<NaiveTime>,
    pub clinic_end_time: Option<NaiveTime>,
    pub break_start_time: Option<NaiveTime>,
    pub break_end_time: Option<NaiveTime>,
    pub slot_minutes: Option<i32>,
    pub schedule_notes: String,
    pub schedule_published: bool,
}

impl From<&Row> for Doctor {
    fn from(row: &Row) -> Self {
        let username: String = row.get("username");
        let first_name: String = row.get("first_name");
        let last_name: String = row.get("last_name");
        Doctor {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: display_name(&first_name, &last_name, &username),
            email: row.get("email"),
            account_active: row.get("is_active"),
            registration_no: row.get("registration_no"),
            specialization: row.get("specialization"),
            experience_years: row.get("experience_years"),
            hospital: row.get("hospital"),
            city: row.get("city"),
            slot_preference: row.get("slot_preference"),
            fee: row.get("fee"),
            bio: row.get("bio"),
            status: row.get("status"),
            schedule: Schedule {
                working_days: row.get("working_days"),
                clinic_start_time: row.get("clinic_start_time"),
                clinic_end_time: row.get("clinic_end_time"),
                break_start_time: row.get("break_start_time"),
                break_end_time: row.get("break_end_time"),
                slot_minutes: row.get("slot_minutes"),
                schedule_notes: row.get("schedule_notes"),
                schedule_published: row.get("schedule_published"),
            },
            created_at: row.get("created_at"),
        }
    }
}
