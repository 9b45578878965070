//! Error types for the leaderboard API server.
//!
//! [`ObserverError`] is the API layer's failure type. Its
//! [`IntoResponse`](axum::response::IntoResponse) implementation logs the
//! cause and answers with a JSON 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use house_cup_db::StoreError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The event store could not answer a query.
    #[error("query failed: {0}")]
    Query(#[from] StoreError),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let Self::Query(e) = &self;
        tracing::error!(error = %e, "Leaderboard query failed");
        let status = StatusCode::INTERNAL_SERVER_ERROR;

        let body = serde_json::json!({
            "error": "failed to query leaderboard",
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
