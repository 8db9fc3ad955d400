//! The authenticated HTTP surface.
//!
//! All `/graph/*` endpoints require a bearer token validated by
//! [`auth::TokenValidator`]; `/health` is public. Error kinds map onto
//! status codes in one place, [`ApiError`].

pub mod auth;
pub mod handlers;
pub mod schemas;

pub use auth::{Claims, CurrentUser, TokenValidator};

use crate::services::{EntityService, EntryIngestionService, SearchService};
use crate::storage::StoreHealth;
use crate::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Entry ingestion service.
    pub ingestion: Arc<EntryIngestionService>,
    /// Entity read/delete service.
    pub entities: Arc<EntityService>,
    /// Search service.
    pub search: Arc<SearchService>,
    /// Store liveness probe for `/health`.
    pub health: Arc<dyn StoreHealth>,
    /// Bearer-token validator.
    pub auth: Arc<TokenValidator>,
}

/// Builds the application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/graph/entries", post(handlers::ingest_entry))
        .route("/graph/entities", get(handlers::list_entities))
        .route("/graph/entities/{id}", get(handlers::get_entity))
        .route(
            "/graph/entities/{id}/relations",
            get(handlers::list_entity_relations),
        )
        .route("/graph/search/text", post(handlers::text_search))
        .route("/graph/search/semantic", post(handlers::semantic_search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An error leaving the API surface.
///
/// Wraps [`enum@Error`] and maps each kind to its status code; the body is a
/// `{"detail": …}` object.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ExtractionProvider(_) => StatusCode::BAD_GATEWAY,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::OperationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = %status, "Request failed");
        }
        let body = Json(serde_json::json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::ExtractionProvider("x".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::StoreUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, expected) in cases {
            let response = ApiError(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
