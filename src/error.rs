use actix_session::{SessionGetError, SessionInsertError};
use actix_web::http::{header, StatusCode};
use actix_web::{Error as ActixError, HttpResponse, ResponseError};
use deadpool_postgres::PoolError;
use derive_more::{Display, From};
use password_hash::Error as HashError;
use serde_json::json;
use tokio_postgres::error::{Error as PGError, SqlState};

use crate::appointments::WorkflowError;

#[derive(Display, From, Debug)]
pub enum AppError {
    #[display(fmt = "not found")]
    #[from(ignore)]
    NotFound,
    #[display(fmt = "forbidden")]
    #[from(ignore)]
    Forbidden,
    #[display(fmt = "invalid session")]
    #[from(ignore)]
    Unauthorized,
    #[display(fmt = "Invalid username or password.")]
    #[from(ignore)]
    InvalidCredentials,
    #[display(fmt = "method not allowed")]
    #[from(ignore)]
    MethodNotAllowed,
    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Redirect(String),
    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Validation(String),
    #[display(fmt = "{}", _0)]
    #[from(ignore)]
    Rule(String),
    #[display(fmt = "the appointment was changed by someone else, reload and try again")]
    #[from(ignore)]
    Conflict,
    PGError(PGError),
    PoolError(PoolError),
    HashError(HashError),
    CsvError(csv::Error),
    SessionGetError(SessionGetError),
    SessionInsertError(SessionInsertError),
    ActixError(ActixError),
}
impl std::error::Error for AppError {}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn rule(msg: impl Into<String>) -> Self {
        AppError::Rule(msg.into())
    }

    pub fn redirect(msg: impl Into<String>) -> Self {
        AppError::Redirect(msg.into())
    }

    /// True when the database refused a write because of a unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::PGError(err) => err.code() == Some(&SqlState::UNIQUE_VIOLATION),
            _ => false,
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Forbidden => AppError::Forbidden,
            WorkflowError::Invalid(msg) => AppError::Validation(msg.to_string()),
            WorkflowError::NotAllowed(msg) => AppError::Rule(msg.to_string()),
        }
    }
}

fn error_body(msg: &str) -> serde_json::Value {
    json!({"status": "error", "error": msg})
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Redirect(_) => StatusCode::SEE_OTHER,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Rule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Redirect(msg) => HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/"))
                .json(error_body(msg)),
            AppError::PGError(err) => {
                log::error!("database error: {}", err);
                HttpResponse::InternalServerError().finish()
            }
            AppError::PoolError(err) => {
                log::error!("pool error: {}", err);
                HttpResponse::InternalServerError().finish()
            }
            AppError::HashError(_)
            | AppError::CsvError(_)
            | AppError::SessionGetError(_)
            | AppError::SessionInsertError(_)
            | AppError::ActixError(_) => {
                log::error!("internal error: {}", self);
                HttpResponse::InternalServerError().finish()
            }
            _ => HttpResponse::build(self.status_code()).json(error_body(&self.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_keep_their_message() {
        let resp = AppError::validation("Invalid date or time.").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::rule("This appointment cannot be cancelled.").error_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn redirect_points_home() {
        let resp = AppError::redirect("closed").error_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[test]
    fn ownership_and_absence_are_distinct() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn workflow_errors_map_to_taxonomy() {
        let err: AppError = WorkflowError::Invalid("Choose a future date/time.").into();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Choose a future date/time."));
        let err: AppError = WorkflowError::NotAllowed("nope").into();
        assert!(matches!(err, AppError::Rule(_)));
        let err: AppError = WorkflowError::Forbidden.into();
        assert!(matches!(err, AppError::Forbidden));
    }
}
