//! API error type shared by all handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("a record with email {0} already exists")]
    DuplicateEmail(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("record not found".to_string()),
            StoreError::DuplicateEmail(email) => ApiError::DuplicateEmail(email),
            StoreError::InvalidDocument(msg) => ApiError::InvalidInput(msg),
            StoreError::Database(e) => ApiError::Internal(e.into()),
            StoreError::Serde(e) => ApiError::Internal(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail(_) => StatusCode::CONFLICT,
            ApiError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
