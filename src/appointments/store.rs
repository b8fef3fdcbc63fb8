//! SQL access to the appointment ledger.

use chrono::{NaiveDate, NaiveTime};
use deadpool_postgres::Client;
use postgres_types::ToSql;

use super::models::{Appointment, AppointmentStatus, AppointmentView};
use super::workflow::Transition;
use crate::db::Filter;
use crate::error::AppError;

pub const VIEW_SELECT: &str = "SELECT a.*,
        p.username AS patient_username, p.first_name AS patient_first_name,
        p.last_name AS patient_last_name, p.email AS patient_email,
        du.username AS doctor_username, du.first_name AS doctor_first_name,
        du.last_name AS doctor_last_name, d.specialization AS doctor_specialization
    FROM appointments a
    JOIN users p ON p.id = a.patient_id
    JOIN doctor_profiles d ON d.id = a.doctor_id
    JOIN users du ON du.id = d.user_id";

pub const NEWEST_FIRST: &str = " ORDER BY a.date DESC, a.time DESC, a.id DESC";
pub const OLDEST_FIRST: &str = " ORDER BY a.date ASC, a.time ASC, a.id ASC";

pub struct NewAppointment {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub department: String,
    pub hospital: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub symptoms: String,
}

pub async fn get(db_conn: &Client, id: i32) -> Result<Appointment, AppError> {
    db_conn
        .query_opt("SELECT * FROM appointments WHERE id = $1", &[&id])
        .await?
        .map(|row| Appointment::from(&row))
        .ok_or(AppError::NotFound)
}

pub async fn get_view(db_conn: &Client, id: i32) -> Result<AppointmentView, AppError> {
    let sql = format!("{} WHERE a.id = $1", VIEW_SELECT);
    db_conn
        .query_opt(sql.as_str(), &[&id])
        .await?
        .map(|row| AppointmentView::from(&row))
        .ok_or(AppError::NotFound)
}

pub async fn insert(db_conn: &Client, new: &NewAppointment) -> Result<Appointment, AppError> {
    let row = db_conn
        .query_one(
            "INSERT INTO appointments
                (patient_id, doctor_id, department, hospital, date, time, symptoms, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
            &[
                &new.patient_id,
                &new.doctor_id,
                &new.department,
                &new.hospital,
                &new.date,
                &new.time,
                &new.symptoms,
                &AppointmentStatus::Pending,
            ],
        )
        .await?;
    Ok(Appointment::from(&row))
}

/// Writes `transition` only if the row still has the status and version
/// it was planned from.
pub async fn apply(db_conn: &Client, transition: &Transition) -> Result<Appointment, AppError> {
    let date = transition.slot.map(|slot| slot.date);
    let time = transition.slot.map(|slot| slot.time);
    let row = db_conn
        .query_opt(
            "UPDATE appointments
             SET status = $1, date = COALESCE($2, date), time = COALESCE($3, time),
                 version = version + 1, updated_at = now()
             WHERE id = $4 AND status = $5 AND version = $6
             RETURNING *",
            &[
                &transition.next,
                &date,
                &time,
                &transition.appointment_id,
                &transition.expected,
                &transition.expected_version,
            ],
        )
        .await?;
    match row {
        Some(row) => Ok(Appointment::from(&row)),
        None => {
            log::warn!(
                "appointment {} left {} before it could become {}",
                transition.appointment_id,
                transition.expected,
                transition.next
            );
            Err(AppError::Conflict)
        }
    }
}

pub async fn list(
    db_conn: &Client,
    filter: &Filter,
    order: &str,
    limit: Option<i64>,
) -> Result<Vec<AppointmentView>, AppError> {
    let mut sql = format!("{}{}{}", VIEW_SELECT, filter.where_clause(), order);
    let mut params = filter.params();
    if let Some(limit) = limit.as_ref() {
        sql.push_str(&format!(" LIMIT {}", filter.next_placeholder(1)));
        params.push(limit as &(dyn ToSql + Sync));
    }
    let views: Vec<AppointmentView> = db_conn
        .query(sql.as_str(), &params)
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    Ok(views)
}


#[cfg(test)]
mod tests {
    use super::testing::{book, seed};
    use super::*;
    use crate::db::testing::live_pool;

    #[actix_rt::test]
    async fn stale_version_is_a_conflict_and_writes_nothing() {
        let db_pool = match live_pool(2).await {
            Some(db_pool) => db_pool,
            None => return,
        };
        let seeded = seed(&db_pool).await;
        let db_conn = db_pool.get().await.unwrap();
        let booked = book(&db_conn, &seeded, "2031-05-02", "09:00").await;

        let approve = Transition {
            appointment_id: booked.id,
            expected: AppointmentStatus::Pending,
            expected_version: booked.version,
            next: AppointmentStatus::Approved,
            slot: None,
        };
        let approved = apply(&db_conn, &approve).await.unwrap();
        assert_eq!(approved.status, AppointmentStatus::Approved);
        assert_eq!(approved.version, booked.version + 1);

        let stale_reject = Transition {
            next: AppointmentStatus::Rejected,
            ..approve
        };
        let err = apply(&db_conn, &stale_reject).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));

        let current = get(&db_conn, booked.id).await.unwrap();
        assert_eq!(current.status, AppointmentStatus::Approved);
        assert_eq!(current.version, approved.version);
    }

    #[actix_rt::test]
    async fn newest_first_orders_by_date_then_time() {
        let db_pool = match live_pool(2).await {
            Some(db_pool) => db_pool,
            None => return,
        };
        let seeded = seed(&db_pool).await;
        let db_conn = db_pool.get().await.unwrap();
        let early = book(&db_conn, &seeded, "2031-05-02", "09:00").await;
        let latest = book(&db_conn, &seeded, "2031-05-03", "08:00").await;
        let later = book(&db_conn, &seeded, "2031-05-02", "11:00").await;

        let mut filter = Filter::new();
        filter.push("a.doctor_id = ?", seeded.doctor_id);
        let ids: Vec<i32> = list(&db_conn, &filter, NEWEST_FIRST, None)
            .await
            .unwrap()
            .iter()
            .map(|view| view.appointment.id)
            .collect();
        assert_eq!(ids, vec![latest.id, later.id, early.id]);
    }
}
