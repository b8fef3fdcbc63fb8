use actix_web::{
    get,
    web::{self, ServiceConfig},
    HttpResponse, Result,
};
use deadpool_postgres::Pool;
use postgres_types::ToSql;
use serde::Deserialize;
use serde_json::json;

use crate::audit::{AuditEntry, EventKind};
use crate::db::Filter;
use crate::error::AppError;
use crate::forms::non_blank;
use crate::identity::Staff;

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 300;

const USER_SEARCH: [&str; 3] = ["u.username", "u.first_name", "u.last_name"];

pub fn config(cfg: &mut ServiceConfig) {
    cfg.service(audit_logs);
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    event: Option<String>,
    user: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

impl LogsQuery {
    /// 1-based page and a page size within `1..=MAX_PER_PAGE`.
    fn page(&self) -> (i64, i64) {
        let page = self.page.filter(|page| *page > 0).unwrap_or(1);
        let per_page = self
            .per_page
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);
        (page, per_page)
    }

    fn to_filter(&self) -> Result<Filter, AppError> {
        let mut filter = Filter::new();
        if let Some(event) = non_blank(&self.event) {
            let kind: EventKind = serde_json::from_value(json!(event))
                .map_err(|_| AppError::validation("Unknown event type."))?;
            filter.push("l.kind = ?", kind);
        }
        if let Some(user) = non_blank(&self.user) {
            filter.search(&USER_SEARCH, user);
        }
        Ok(filter)
    }
}

#[get("/dabs-admin/logs")]
async fn audit_logs(
    _staff: Staff,
    query: web::Query<LogsQuery>,
    db_pool: web::Data<Pool>,
) -> Result<HttpResponse, AppError> {
    let filter = query.to_filter()?;
    let (page, per_page) = query.page();
    let offset = (page - 1) * per_page;

    let sql = format!(
        "SELECT l.*, u.username FROM audit_log l LEFT JOIN users u ON u.id = l.user_id{}
         ORDER BY l.created_at DESC, l.id DESC LIMIT {} OFFSET {}",
        filter.where_clause(),
        filter.next_placeholder(1),
        filter.next_placeholder(2)
    );
    let mut params = filter.params();
    params.push(&per_page as &(dyn ToSql + Sync));
    params.push(&offset as &(dyn ToSql + Sync));

    let db_conn = db_pool.get().await?;
    let entries: Vec<AuditEntry> = db_conn
        .query(sql.as_str(), &params)
        .await?
        .iter()
        .map(|row| row.into())
        .collect();
    Ok(HttpResponse::Ok().json(json!({
        "page": page,
        "perPage": per_page,
        "logs": entries,
    })))
}
