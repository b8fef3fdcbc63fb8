use actix_web::{
    get,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use chrono::NaiveDate;
use deadpool_postgres::Pool;
use serde::Serialize;
use serde_json::json;
use tokio_postgres::row::Row;

use super::AppointmentQuery;
use crate::appointments::store::{self, NEWEST_FIRST};
use crate::appointments::AppointmentStatus;
use crate::db::Filter;
use crate::doctor::list_doctors;
use crate::error::AppError;
use crate::identity::Staff;

const HISTORY_ROWS: i64 = 100;
const DAILY_ROWS: i64 = 30;

const STATUS_COUNTS: &str = "COUNT(*) AS total,
    COUNT(*) FILTER (WHERE a.status = 'Pending') AS pending,
    COUNT(*) FILTER (WHERE a.status = 'Approved') AS approved,
    COUNT(*) FILTER (WHERE a.status = 'Cancelled') AS cancelled";

/// Joins the report aggregates need so search columns resolve.
const REPORT_FROM: &str = " FROM appointments a
    JOIN users p ON p.id = a.patient_id
    JOIN doctor_profiles d ON d.id = a.doctor_id
    JOIN users du ON du.id = d.user_id";

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(reports);
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub cancelled: i64,
}

impl From<&Row> for Totals {
    fn from(row: &Row) -> Self {
        Totals {
            total: row.get("total"),
            pending: row.get("pending"),
            approved: row.get("approved"),
            cancelled: row.get("cancelled"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: AppointmentStatus,
    pub total: i64,
}

async fn totals(db_conn: &deadpool_postgres::Client, filter: &Filter) -> Result<Totals, AppError> {
    let sql = format!("SELECT {}{}{}", STATUS_COUNTS, REPORT_FROM, filter.where_clause());
    let row = db_conn.query_one(sql.as_str(), &filter.params()).await?;
    Ok(Totals::from(&row))
}

async fn status_counts(
    db_conn: &deadpool_postgres::Client,
    filter: &Filter,
) -> Result<Vec<StatusCount>, AppError> {
    let sql = format!(
        "SELECT a.status, COUNT(*) AS total{}{} GROUP BY a.status ORDER BY a.status",
        REPORT_FROM,
        filter.where_clause()
    );
    let counts = db_conn
        .query(sql.as_str(), &filter.params())
        .await?
        .iter()
        .map(|row| StatusCount {
            status: row.get("status"),
            total: row.get("total"),
        })
        .collect();
    Ok(counts)
}

async fn daily_counts(
    db_conn: &deadpool_postgres::Client,
    filter: &Filter,
) -> Result<Vec<DailyCount>, AppError> {
    let sql = format!(
        "SELECT a.date, {}{}{} GROUP BY a.date ORDER BY a.date DESC LIMIT {}",
        STATUS_COUNTS,
        REPORT_FROM,
        filter.where_clause(),
        DAILY_ROWS
    );
    let days = db_conn
        .query(sql.as_str(), &filter.params())
        .await?
        .iter()
        .map(|row| DailyCount {
            date: row.get("date"),
            totals: Totals::from(row),
        })
        .collect();
    Ok(days)
}

#[get("/dabs-admin/reports")]
async fn reports(
    _staff: Staff,
    query: web::Query<AppointmentQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let filter = query.to_filter()?;
    let db_conn = db_pool.get().await?;

    let summary = totals(&db_conn, &filter).await?;
    let by_status = status_counts(&db_conn, &filter).await?;
    let daily = daily_counts(&db_conn, &filter).await?;
    let history = store::list(&db_conn, &filter, NEWEST_FIRST, Some(HISTORY_ROWS)).await?;
    let doctors = list_doctors(&db_conn, &Filter::new()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "totals": summary,
        "statusCounts": by_status,
        "dailyCounts": daily,
        "appointments": history,
        "doctors": doctors,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_rows_flatten_their_totals() {
        let day = DailyCount {
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            totals: Totals {
                total: 4,
                pending: 1,
                approved: 2,
                cancelled: 1,
            },
        };
        let value = serde_json::to_value(&day).unwrap();
        assert_eq!(
            value,
            json!({"date": "2025-05-01", "total": 4, "pending": 1, "approved": 2, "cancelled": 1})
        );
    }
}
