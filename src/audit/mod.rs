use actix_web::{http::header, HttpRequest};
use async_trait::async_trait;
use chrono::prelude::*;
use deadpool_postgres::{Pool, Timeouts};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::appointments::AppointmentView;
use crate::error::AppError;

mod models;
pub use models::AuditEntry;

const USER_AGENT_MAX: usize = 255;

/// Longest an audit write waits for a pooled connection.
const CHECKOUT_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSql, FromSql)]
#[serde(rename_all = "snake_case")]
#[postgres(name = "audit_kind")]
pub enum EventKind {
    #[postgres(name = "user_created")]
    UserCreated,
    #[postgres(name = "login")]
    Login,
    #[postgres(name = "login_failed")]
    LoginFailed,
    #[postgres(name = "logout")]
    Logout,
    #[postgres(name = "appointment_created")]
    AppointmentCreated,
    #[postgres(name = "appointment_updated")]
    AppointmentUpdated,
    #[postgres(name = "appointment_deleted")]
    AppointmentDeleted,
    #[postgres(name = "admin_action")]
    AdminAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub kind: EventKind,
    pub message: String,
    pub actor: Option<i32>,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
    pub at: DateTime<Local>,
}

impl AuditEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        AuditEvent {
            kind,
            message: message.into(),
            actor: None,
            origin: None,
            user_agent: None,
            at: Local::now(),
        }
    }

    pub fn by(mut self, actor: i32) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Fills the network origin and user agent from `req`.
    pub fn from_request(mut self, req: &HttpRequest) -> Self {
        self.origin = req.peer_addr().map(|addr| addr.ip().to_string());
        self.user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.chars().take(USER_AGENT_MAX).collect());
        self
    }

    pub fn user_created(id: i32, username: &str) -> Self {
        AuditEvent::new(EventKind::UserCreated, format!("New user registered: {}", username)).by(id)
    }

    pub fn login(id: i32, username: &str) -> Self {
        AuditEvent::new(EventKind::Login, format!("User logged in: {}", username)).by(id)
    }

    pub fn logout(id: i32, username: &str) -> Self {
        AuditEvent::new(EventKind::Logout, format!("User logged out: {}", username)).by(id)
    }

    pub fn login_failed(username: &str) -> Self {
        let username = if username.is_empty() { "unknown" } else { username };
        AuditEvent::new(
            EventKind::LoginFailed,
            format!("Failed login attempt for username: {}", username),
        )
    }

    pub fn appointment_created(view: &AppointmentView) -> Self {
        let a = &view.appointment;
        AuditEvent::new(
            EventKind::AppointmentCreated,
            format!(
                "Appointment #{} created: {} → Dr. {} on {} at {} (status={}).",
                a.id,
                view.patient_username,
                view.doctor_name,
                a.date.format("%Y-%m-%d"),
                a.time.format("%H:%M"),
                a.status
            ),
        )
        .by(a.patient_id)
    }

    pub fn appointment_updated(view: &AppointmentView) -> Self {
        let a = &view.appointment;
        AuditEvent::new(
            EventKind::AppointmentUpdated,
            format!(
                "Appointment #{} updated: {} → Dr. {}, date={}, time={}, status={}.",
                a.id,
                view.patient_username,
                view.doctor_name,
                a.date.format("%Y-%m-%d"),
                a.time.format("%H:%M"),
                a.status
            ),
        )
        .by(a.patient_id)
    }

    pub fn appointment_deleted(view: &AppointmentView) -> Self {
        let a = &view.appointment;
        AuditEvent::new(
            EventKind::AppointmentDeleted,
            format!(
                "Appointment #{} deleted: {} → Dr. {}.",
                a.id, view.patient_username, view.doctor_name
            ),
        )
        .by(a.patient_id)
    }

    pub fn admin_action(staff_id: i32, action: impl Into<String>) -> Self {
        AuditEvent::new(EventKind::AdminAction, action).by(staff_id)
    }
}

/// Destination for audit events. Recording never fails from the caller's
/// point of view.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Appends events to the `audit_log` table from a background task, so the
/// caller never waits on the pool it may itself be holding.
pub struct PgAuditSink {
    db_pool: Pool,
}

impl PgAuditSink {
    pub fn new(db_pool: Pool) -> Self {
        PgAuditSink { db_pool }
    }
}

async fn insert(db_pool: &Pool, event: &AuditEvent) -> Result<(), AppError> {
    let timeouts = Timeouts {
        wait: Some(CHECKOUT_WAIT),
        create: Some(CHECKOUT_WAIT),
        recycle: Some(CHECKOUT_WAIT),
    };
    let db_conn = db_pool.timeout_get(&timeouts).await?;
    db_conn
        .execute(
            "INSERT INTO audit_log (kind, message, user_id, ip_address, user_agent, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &event.kind,
                &event.message,
                &event.actor,
                &event.origin,
                &event.user_agent,
                &event.at,
            ],
        )
        .await?;
    Ok(())
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: AuditEvent) {
        let db_pool = self.db_pool.clone();
        actix_rt::spawn(async move {
            if let Err(err) = insert(&db_pool, &event).await {
                log::error!("could not record {:?} event: {}", event.kind, err);
            }
        });
    }
}
