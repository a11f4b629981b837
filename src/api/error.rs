//! API error envelope and the shared store-error handler.
//!
//! Store failures are logged with the failing operation, then propagated to
//! the caller unchanged as `{ "error": { "code", "message" } }`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Db {
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        ApiError::BadParams(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn lock_poisoned() -> Self {
        ApiError::Db {
            code: "db_lock_failed",
            message: "connection mutex poisoned".to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadParams(_) => "bad_params",
            ApiError::NotFound(_) => "not_found",
            ApiError::Db { code, .. } => code,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadParams(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Db { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": { "code": self.code(), "message": self.to_string() }
        }))
    }
}

fn db_failed(code: &'static str, op: &'static str, e: rusqlite::Error) -> ApiError {
    tracing::error!(op, error = %e, "store operation failed");
    ApiError::Db {
        code,
        message: e.to_string(),
    }
}

pub(crate) fn query_failed(op: &'static str, e: rusqlite::Error) -> ApiError {
    db_failed("db_query_failed", op, e)
}

pub(crate) fn insert_failed(op: &'static str, e: rusqlite::Error) -> ApiError {
    db_failed("db_insert_failed", op, e)
}

pub(crate) fn update_failed(op: &'static str, e: rusqlite::Error) -> ApiError {
    db_failed("db_update_failed", op, e)
}

pub(crate) fn delete_failed(op: &'static str, e: rusqlite::Error) -> ApiError {
    db_failed("db_delete_failed", op, e)
}

pub(crate) fn tx_failed(op: &'static str, e: rusqlite::Error) -> ApiError {
    db_failed("db_tx_failed", op, e)
}
