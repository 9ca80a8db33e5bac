//! Routes for customer pricing tiers and current-pricing resolution.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use mindflow_customers::application::{command_handlers, query_handlers};
use mindflow_customers::domain::commands;
use mindflow_customers::domain::entities::PricingTier;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::state::AppState;

/// Request body for POST /{id}/pricing-tiers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPricingTierRequest {
    /// Tier label.
    pub tier_name: String,
    /// Discount in percent, 0 to 100.
    pub discount_percentage: f64,
    /// First instant the tier applies.
    pub effective_date: DateTime<Utc>,
    /// Last instant the tier applies; open-ended when absent.
    pub expiration_date: Option<DateTime<Utc>>,
}

/// Request body for PUT /{id}/pricing-tiers/{tier_id}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePricingTierRequest {
    pub tier_name: Option<String>,
    pub discount_percentage: Option<f64>,
    pub effective_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
}

/// GET /{id}/pricing-tiers
#[instrument(skip(state))]
async fn list_pricing_tiers(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Vec<PricingTier>>, ApiError> {
    let tiers = query_handlers::list_pricing_tiers(id, &*state.customers).await?;
    Ok(Json(tiers))
}

/// GET /{id}/current-pricing
///
/// Responds with `null` when no tier is in force.
#[instrument(skip(state))]
async fn current_pricing(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Option<PricingTier>>, ApiError> {
    let tier =
        query_handlers::get_current_pricing_tier(id, state.clock.as_ref(), &*state.customers)
            .await?;
    Ok(Json(tier))
}

/// POST /{id}/pricing-tiers
#[instrument(skip(state, request), fields(customer_id = %id))]
async fn add_pricing_tier(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(request): JsonBody<AddPricingTierRequest>,
) -> Result<(StatusCode, Json<PricingTier>), ApiError> {
    let command = commands::AddPricingTier {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        tier_name: request.tier_name,
        discount_percentage: request.discount_percentage,
        effective_date: request.effective_date,
        expiration_date: request.expiration_date,
    };

    info!(correlation_id = %command.correlation_id, "handling add_pricing_tier command");

    let tier = command_handlers::handle_add_pricing_tier(
        &command,
        state.clock.as_ref(),
        &*state.customers,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(tier)))
}

/// PUT /{id}/pricing-tiers/{tier_id}
#[instrument(skip(state, request), fields(customer_id = %id, tier_id = %tier_id))]
async fn update_pricing_tier(
    State(state): State<AppState>,
    PathParams((id, tier_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(request): JsonBody<UpdatePricingTierRequest>,
) -> Result<Json<PricingTier>, ApiError> {
    let command = commands::UpdatePricingTier {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        tier_id,
        tier_name: request.tier_name,
        discount_percentage: request.discount_percentage,
        effective_date: request.effective_date,
        expiration_date: request.expiration_date,
    };

    info!(correlation_id = %command.correlation_id, "handling update_pricing_tier command");

    let tier = command_handlers::handle_update_pricing_tier(&command, &*state.customers).await?;

    Ok(Json(tier))
}

/// DELETE /{id}/pricing-tiers/{tier_id}
#[instrument(skip(state), fields(customer_id = %id, tier_id = %tier_id))]
async fn remove_pricing_tier(
    State(state): State<AppState>,
    PathParams((id, tier_id)): PathParams<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let command = commands::RemovePricingTier {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        tier_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_pricing_tier command");

    command_handlers::handle_remove_pricing_tier(&command, &*state.customers).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for pricing tiers, nested under a customer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/pricing-tiers",
            get(list_pricing_tiers).post(add_pricing_tier),
        )
        .route(
            "/{id}/pricing-tiers/{tier_id}",
            put(update_pricing_tier).delete(remove_pricing_tier),
        )
        .route("/{id}/current-pricing", get(current_pricing))
}
