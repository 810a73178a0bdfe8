//! Access-key guard for API routes
//!
//! A single shared key guards every `/api` route. It arrives either in
//! the `x-access-key` header or the `code` query parameter. When no key
//! is configured the check is disabled (local development).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

pub async fn require_access_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.access_key.as_deref() else {
        return next.run(request).await;
    };

    let header_key = request
        .headers()
        .get("x-access-key")
        .and_then(|h| h.to_str().ok());

    let query_key = request
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("code=")));

    if header_key.or(query_key) == Some(expected) {
        next.run(request).await
    } else {
        let body = Json(json!({ "error": "missing or invalid access key" }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
