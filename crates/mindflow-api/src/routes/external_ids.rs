//! Routes for external-system ID mappings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use mindflow_customers::application::{command_handlers, query_handlers};
use mindflow_customers::domain::commands;
use mindflow_customers::domain::entities::ExternalIdMapping;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::state::AppState;

/// Request body for POST /{id}/external-ids.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExternalIdRequest {
    /// External system tag, matched case-sensitively.
    pub external_system: String,
    /// The customer's identifier in that system.
    pub external_customer_id: String,
    /// The customer's display name in that system.
    pub external_customer_name: Option<String>,
    /// Preferred mapping for the system.
    #[serde(default)]
    pub is_primary: bool,
}

/// Request body for PUT /{id}/external-ids/{external_id}. The system tag
/// cannot be changed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExternalIdRequest {
    pub external_customer_id: Option<String>,
    pub external_customer_name: Option<String>,
    pub is_primary: Option<bool>,
}

/// GET /{id}/external-ids
#[instrument(skip(state))]
async fn list_external_ids(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Vec<ExternalIdMapping>>, ApiError> {
    let mappings = query_handlers::list_external_ids(id, &*state.customers).await?;
    Ok(Json(mappings))
}

/// POST /{id}/external-ids
#[instrument(skip(state, request), fields(customer_id = %id, external_system = %request.external_system))]
async fn map_external_id(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(request): JsonBody<MapExternalIdRequest>,
) -> Result<(StatusCode, Json<ExternalIdMapping>), ApiError> {
    let command = commands::MapExternalId {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        external_system: request.external_system,
        external_customer_id: request.external_customer_id,
        external_customer_name: request.external_customer_name,
        is_primary: request.is_primary,
    };

    info!(correlation_id = %command.correlation_id, "handling map_external_id command");

    let mapping = command_handlers::handle_map_external_id(
        &command,
        state.clock.as_ref(),
        &*state.customers,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(mapping)))
}

/// PUT /{id}/external-ids/{external_id}
#[instrument(skip(state, request), fields(customer_id = %id, external_id = %external_id))]
async fn update_external_id(
    State(state): State<AppState>,
    PathParams((id, external_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(request): JsonBody<UpdateExternalIdRequest>,
) -> Result<Json<ExternalIdMapping>, ApiError> {
    let command = commands::UpdateExternalId {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        external_id,
        external_customer_id: request.external_customer_id,
        external_customer_name: request.external_customer_name,
        is_primary: request.is_primary,
    };

    info!(correlation_id = %command.correlation_id, "handling update_external_id command");

    let mapping = command_handlers::handle_update_external_id(&command, &*state.customers).await?;

    Ok(Json(mapping))
}

/// DELETE /{id}/external-ids/{external_id}
#[instrument(skip(state), fields(customer_id = %id, external_id = %external_id))]
async fn remove_external_id(
    State(state): State<AppState>,
    PathParams((id, external_id)): PathParams<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let command = commands::RemoveExternalId {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        external_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_external_id command");

    command_handlers::handle_remove_external_id(&command, &*state.customers).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for external ID mappings, nested under a customer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/external-ids",
            get(list_external_ids).post(map_external_id),
        )
        .route(
            "/{id}/external-ids/{external_id}",
            put(update_external_id).delete(remove_external_id),
        )
}
