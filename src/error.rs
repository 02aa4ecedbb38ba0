//! Error types shared by every handler.
//!
//! Handlers return [`ApiError`], which renders as `{ "error": ... }` JSON with
//! the matching status code. Repositories return [`RepoError`].

use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Field name -> list of problems with that field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let fields = match &self {
            ApiError::Validation(f) => Some(f),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            fields,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Logs the underlying cause and answers with a generic 500.
///
/// `.map_err(internal("Failed to create todo"))?`
pub fn internal<E: std::fmt::Display>(message: &'static str) -> impl FnOnce(E) -> ApiError {
    move |e| {
        error!(error = %e, "{}", message);
        ApiError::Internal(message)
    }
}

/// Collects per-field validation failures before turning them into one error.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
        self
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// A stored row could not be mapped onto the domain type.
    #[error("invalid row: {0}")]
    Decode(anyhow::Error),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => RepoError::Conflict,
            _ => RepoError::Database(e),
        }
    }
}
