//! Staff-only screens under `/dabs-admin`.

use actix_web::{
    get,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use chrono::Local;
use deadpool_postgres::{Client, Pool};
use serde::Deserialize;
use serde_json::json;

use crate::appointments::store::VIEW_SELECT;
use crate::appointments::{AppointmentStatus, AppointmentView};
use crate::db::Filter;
use crate::error::AppError;
use crate::forms::{non_blank, parse_date};
use crate::identity::Staff;

mod appointments;
mod doctors;
mod logs;
mod patients;
mod reports;
mod settings;

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(admin_dashboard);
    doctors::config(cfg);
    patients::config(cfg);
    appointments::config(cfg);
    reports::config(cfg);
    settings::config(cfg);
    logs::config(cfg);
}

#[get("/dabs-admin/dashboard")]
async fn admin_dashboard(
    _staff: Staff,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let db_conn = db_pool.get().await?;
    let today = Local::now().date_naive();
    let row = db_conn
        .query_one(
            "SELECT
                (SELECT COUNT(*) FROM doctor_profiles WHERE status = 'Active') AS total_doctors,
                (SELECT COUNT(*) FROM doctor_profiles WHERE status = 'Pending') AS pending_doctors,
                (SELECT COUNT(*) FROM users WHERE NOT is_staff) AS total_patients,
                (SELECT COUNT(*) FROM appointments WHERE date = $1) AS todays_appointments",
            &[&today],
        )
        .await?;
    let total_doctors: i64 = row.get("total_doctors");
    let pending_doctors: i64 = row.get("pending_doctors");
    let total_patients: i64 = row.get("total_patients");
    let todays_appointments: i64 = row.get("todays_appointments");
    Ok(HttpResponse::Ok().json(json!({
        "totalDoctors": total_doctors,
        "pendingDoctors": pending_doctors,
        "totalPatients": total_patients,
        "todaysAppointments": todays_appointments,
    })))
}

/// Columns the admin appointment search matches against.
const APPOINTMENT_SEARCH: [&str; 9] = [
    "p.first_name",
    "p.last_name",
    "p.username",
    "p.email",
    "du.first_name",
    "du.last_name",
    "d.specialization",
    "a.hospital",
    "a.department",
];

/// Query string shared by the appointment list, its CSV export and the
/// reports screen.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    q: Option<String>,
    status: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    doctor: Option<String>,
}

impl AppointmentQuery {
    /// Unparseable dates and doctor ids are ignored. An unknown status is
    /// rejected.
    pub fn to_filter(&self) -> Result<Filter, AppError> {
        let mut filter = Filter::new();
        if let Some(q) = non_blank(&self.q) {
            filter.search(&APPOINTMENT_SEARCH, q);
        }
        if let Some(doctor_id) = non_blank(&self.doctor).and_then(|id| id.parse::<i32>().ok()) {
            filter.push("a.doctor_id = ?", doctor_id);
        }
        if let Some(status) = non_blank(&self.status) {
            let status: AppointmentStatus = status
                .parse()
                .map_err(|_| AppError::validation("Unknown appointment status."))?;
            filter.push("a.status = ?", status);
        }
        if let Some(start) = non_blank(&self.start_date).and_then(parse_date) {
            filter.push("a.date >= ?", start);
        }
        if let Some(end) = non_blank(&self.end_date).and_then(parse_date) {
            filter.push("a.date <= ?", end);
        }
        Ok(filter)
    }
}

/// Runs `delete_sql` for `id` in one transaction and returns the
/// appointments the cascade took with it.
async fn delete_cascading(
    db_conn: &mut Client,
    owner_column: &str,
    delete_sql: &str,
    id: i32,
) -> Result<Vec<AppointmentView>, AppError> {
    let txn = db_conn.transaction().await?;
    let sql = format!("{} WHERE {} = $1 FOR UPDATE OF a", VIEW_SELECT, owner_column);
    let removed: Vec<AppointmentView> = txn
        .query(sql.as_str(), &[&id])
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    if txn.execute(delete_sql, &[&id]).await? == 0 {
        return Err(AppError::NotFound);
    }
    txn.commit().await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::store::testing::{book, seed};
    use crate::db::testing::{count, live_pool};
    use crate::identity::{Role, SessionUser};
    use actix_session::Session;
    use actix_web::{http::header, http::StatusCode, test, App};
    use deadpool_postgres::{Config, Runtime};
    use tokio_postgres::NoTls;

    fn query(pairs: &[(&str, &str)]) -> AppointmentQuery {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        web::Query::<AppointmentQuery>::from_query(&encoded)
            .unwrap()
            .into_inner()
    }

    #[::core::prelude::v1::test]
    fn bad_dates_are_ignored() {
        let filter = query(&[("start_date", "2025-13-01"), ("end_date", "2025-02-01")])
            .to_filter()
            .unwrap();
        assert_eq!(filter.where_clause(), " WHERE a.date <= $1");
    }

    #[::core::prelude::v1::test]
    fn full_query_builds_in_order() {
        let filter = query(&[
            ("q", "card"),
            ("doctor", "3"),
            ("status", "approved"),
            ("start_date", "2025-01-01"),
        ])
        .to_filter()
        .unwrap();
        let clause = filter.where_clause();
        assert!(clause.starts_with(" WHERE (p.first_name ILIKE $1 OR"));
        assert!(clause.ends_with("AND a.doctor_id = $2 AND a.status = $3 AND a.date >= $4"));
    }

    #[::core::prelude::v1::test]
    fn unknown_status_is_rejected() {
        let err = query(&[("status", "Lost")]).to_filter().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    async fn sign_in_doctor(session: Session) -> Result<HttpResponse, AppError> {
        let user = SessionUser {
            id: 2,
            username: "doc@example.org".into(),
            role: Role::Doctor,
            doctor_id: Some(1),
        };
        user.store(&session)?;
        Ok(HttpResponse::Ok().finish())
    }

    #[actix_rt::test]
    async fn non_staff_are_sent_home() {
        let mut cfg = Config::default();
        cfg.host = Some("127.0.0.1".to_string());
        cfg.port = Some(1);
        cfg.dbname = Some("dabs".to_string());
        let db_pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls).unwrap();
        let app = test::init_service(
            App::new()
                .wrap(crate::session_middleware(&[9; 64]))
                .app_data(web::Data::new(db_pool))
                .route("/test/sign-in", web::post().to(sign_in_doctor))
                .configure(config),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/test/sign-in").to_request(),
        )
        .await;
        let cookie = resp.response().cookies().next().unwrap().into_owned();

        for uri in &[
            "/dabs-admin/dashboard",
            "/dabs-admin/doctors",
            "/dabs-admin/appointments/export/csv",
            "/dabs-admin/logs",
        ] {
            let req = test::TestRequest::get()
                .uri(uri)
                .cookie(cookie.clone())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{}", uri);
            assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
        }
    }

    #[actix_rt::test]
    async fn deleting_a_doctor_takes_its_appointments() {
        let db_pool = match live_pool(2).await {
            Some(db_pool) => db_pool,
            None => return,
        };
        let seeded = seed(&db_pool).await;
        let mut db_conn = db_pool.get().await.unwrap();
        let first = book(&db_conn, &seeded, "2031-06-01", "09:00").await;
        let second = book(&db_conn, &seeded, "2031-06-02", "10:00").await;
        let booked = "SELECT COUNT(*) FROM appointments WHERE doctor_id = $1";
        assert_eq!(count(&db_pool, booked, &[&seeded.doctor_id]).await, 2);

        let removed = delete_cascading(
            &mut db_conn,
            "a.doctor_id",
            "DELETE FROM doctor_profiles WHERE id = $1",
            seeded.doctor_id,
        )
        .await
        .unwrap();
        let mut ids: Vec<i32> = removed.iter().map(|view| view.appointment.id).collect();
        ids.sort();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(count(&db_pool, booked, &[&seeded.doctor_id]).await, 0);

        let users = "SELECT COUNT(*) FROM users WHERE id = $1";
        assert_eq!(count(&db_pool, users, &[&seeded.doctor_user_id]).await, 1);

        let again = delete_cascading(
            &mut db_conn,
            "a.doctor_id",
            "DELETE FROM doctor_profiles WHERE id = $1",
            seeded.doctor_id,
        )
        .await;
        assert!(matches!(again, Err(AppError::NotFound)));
    }
}
