//! Endpoint handlers.

use super::schemas::{
    EntityListResponse, HealthResponse, ListQuery, SemanticSearchRequest, TextSearchRequest,
};
use super::{ApiError, AppState, CurrentUser};
use crate::models::{Entity, EntryIngestionRequest, EntryIngestionResponse, Relation};
use crate::services::SemanticSearchResult;
use crate::Error;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

/// `POST /graph/entries`: accepts an entry and schedules extraction.
///
/// Returns 202 before any provider call in deferred mode; a provider error
/// from synchronous mode surfaces as 502.
pub async fn ingest_entry(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut request): Json<EntryIngestionRequest>,
) -> Result<(StatusCode, Json<EntryIngestionResponse>), ApiError> {
    if request.text.trim().is_empty() {
        return Err(Error::InvalidInput("text must not be empty".to_string()).into());
    }

    // Tag the submitter without clobbering a client-supplied value.
    request
        .metadata
        .entry("submitted_by".to_string())
        .or_insert_with(|| serde_json::json!(user.email));

    let force_sync = request.process_synchronously;
    let response = state.ingestion.ingest_entry(request, force_sync).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// `GET /graph/entities/{id}`: one entity or 404.
pub async fn get_entity(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Entity>, ApiError> {
    let entity = state
        .entities
        .get(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("entity {id} not found")))?;
    Ok(Json(entity))
}

/// `GET /graph/entities`: paginated scan.
pub async fn list_entities(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntityListResponse>, ApiError> {
    let items = state.entities.list(query.limit, query.skip).await?;
    let total = items.len();
    Ok(Json(EntityListResponse { items, total }))
}

/// `GET /graph/entities/{id}/relations`: outbound edges of an entity.
pub async fn list_entity_relations(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Relation>>, ApiError> {
    if state.entities.get(&id).await?.is_none() {
        return Err(Error::NotFound(format!("entity {id} not found")).into());
    }
    let relations = state.entities.relations_for(&id).await?;
    Ok(Json(relations))
}

/// `POST /graph/search/text`: substring search.
pub async fn text_search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<TextSearchRequest>,
) -> Result<Json<Vec<Entity>>, ApiError> {
    request.validate()?;
    let results = state.search.text_search(&request.query, request.limit).await?;
    Ok(Json(results))
}

/// `POST /graph/search/semantic`: the labeled text-proxy stub.
pub async fn semantic_search(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<SemanticSearchRequest>,
) -> Result<Json<SemanticSearchResult>, ApiError> {
    request.validate()?;
    let result = state
        .search
        .semantic_search(&request.query, request.limit)
        .await?;
    Ok(Json(result))
}

/// `GET /health`: public liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.health.verify_connectivity().await {
        "healthy"
    } else {
        "unhealthy"
    };
    Json(HealthResponse {
        status: "healthy",
        database,
    })
}
