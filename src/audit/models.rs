use chrono::prelude::*;
use serde::Serialize;
use tokio_postgres::row::Row;

use super::EventKind;

/// A stored audit row with the actor's username, if the actor still exists.
#[derive(Debug, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct AuditEntry {
    pub id: i64,
    pub kind: EventKind,
    pub message: String,
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Local>,
}

impl From<&Row> for AuditEntry {
    fn from(row: &Row) -> Self {
        AuditEntry {
            id: row.get("id"),
            kind: row.get("kind"),
            message: row.get("message"),
            user_id: row.get("user_id"),
            username: row.get("username"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
        }
    }
}
