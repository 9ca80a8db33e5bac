//! Routes for customers, the root of the Customers context.
//!
//! Child resources (contacts, pricing tiers, external IDs) live in their own
//! modules and are merged into this router under `/{id}/...`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use mindflow_core::pagination::{Page, PageRequest};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use mindflow_customers::application::command_handlers;
use mindflow_customers::application::query_handlers::{self, CustomerView, ListCustomersQuery};
use mindflow_customers::domain::commands::{self, DeleteMode};
use mindflow_customers::domain::entities::{Customer, CustomerType};
use mindflow_customers::domain::repository::CustomerFilter;

use super::{contacts, external_ids, pricing_tiers};
use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::state::AppState;

/// Query string for GET /.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCustomersParams {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Case-insensitive substring of the customer name.
    pub search: Option<String>,
    /// Only customers of this type.
    #[serde(alias = "customer_type")]
    pub customer_type: Option<CustomerType>,
    /// Only active or only inactive customers.
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

/// Query string for GET /{id}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCustomerParams {
    /// Load contacts, pricing tiers and external IDs. Defaults to `true`.
    #[serde(alias = "include_relations")]
    pub include_relations: Option<bool>,
}

/// Query string for DELETE /{id}.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteCustomerParams {
    /// Remove the record instead of deactivating it.
    pub hard: Option<bool>,
}

/// Request body for POST /.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    /// Display name.
    pub customer_name: String,
    /// Builder type.
    pub customer_type: CustomerType,
    /// Free-text pricing tier label.
    pub pricing_tier: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// Request body for PUT /{id}. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    /// New display name.
    pub customer_name: Option<String>,
    /// New builder type.
    pub customer_type: Option<CustomerType>,
    /// New pricing tier label.
    pub pricing_tier: Option<String>,
    /// Contact to designate as primary.
    pub primary_contact_id: Option<Uuid>,
    /// Reactivate or deactivate.
    pub is_active: Option<bool>,
    /// New notes.
    pub notes: Option<String>,
}

/// GET /
#[instrument(skip(state))]
async fn list_customers(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListCustomersParams>,
) -> Result<Json<Page<Customer>>, ApiError> {
    let query = ListCustomersQuery {
        filter: CustomerFilter {
            search: params.search,
            customer_type: params.customer_type,
            is_active: params.is_active,
        },
        page: PageRequest::new(params.page, params.limit)?,
    };

    let page = query_handlers::list_customers(&query, &*state.customers).await?;

    Ok(Json(page))
}

/// POST /
#[instrument(skip(state, request), fields(customer_type = ?request.customer_type))]
async fn create_customer(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let command = commands::CreateCustomer {
        correlation_id: Uuid::new_v4(),
        customer_name: request.customer_name,
        customer_type: request.customer_type,
        pricing_tier: request.pricing_tier,
        notes: request.notes,
    };

    info!(correlation_id = %command.correlation_id, "handling create_customer command");

    let customer = command_handlers::handle_create_customer(
        &command,
        state.clock.as_ref(),
        &*state.customers,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_customer(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(params): QueryParams<GetCustomerParams>,
) -> Result<Json<CustomerView>, ApiError> {
    let include_relations = params.include_relations.unwrap_or(true);
    let view = query_handlers::get_customer_by_id(id, include_relations, &*state.customers).await?;
    Ok(Json(view))
}

/// PUT /{id}
#[instrument(skip(state, request), fields(customer_id = %id))]
async fn update_customer(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(request): JsonBody<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    let command = commands::UpdateCustomer {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        customer_name: request.customer_name,
        customer_type: request.customer_type,
        pricing_tier: request.pricing_tier,
        primary_contact_id: request.primary_contact_id,
        is_active: request.is_active,
        notes: request.notes,
    };

    info!(correlation_id = %command.correlation_id, "handling update_customer command");

    let customer = command_handlers::handle_update_customer(
        &command,
        state.clock.as_ref(),
        &*state.customers,
    )
    .await?;

    Ok(Json(customer))
}

/// DELETE /{id}
#[instrument(skip(state), fields(customer_id = %id))]
async fn delete_customer(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    QueryParams(params): QueryParams<DeleteCustomerParams>,
) -> Result<StatusCode, ApiError> {
    let mode = if params.hard.unwrap_or(false) {
        DeleteMode::Hard
    } else {
        DeleteMode::Soft
    };
    let command = commands::DeleteCustomer {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        mode,
    };

    info!(correlation_id = %command.correlation_id, ?mode, "handling delete_customer command");

    command_handlers::handle_delete_customer(&command, state.clock.as_ref(), &*state.customers)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /external/{system}/{external_customer_id}
#[instrument(skip(state))]
async fn find_by_external_id(
    State(state): State<AppState>,
    PathParams((system, external_customer_id)): PathParams<(String, String)>,
) -> Result<Json<CustomerView>, ApiError> {
    let view =
        query_handlers::find_customer_by_external_id(&system, &external_customer_id, &*state.customers)
            .await?;
    Ok(Json(view))
}

/// Returns the router for customers and their child resources.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_customers).post(create_customer))
        .route(
            "/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route(
            "/external/{system}/{external_customer_id}",
            get(find_by_external_id),
        )
        .merge(contacts::router())
        .merge(pricing_tiers::router())
        .merge(external_ids::router())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use mindflow_test_support::{FailingCustomerRepository, InMemoryCustomerRepository};
    use serde_json::json;

    use super::*;
    use crate::routes::testing::{app_state_with, send};

    fn app(repo: &Arc<InMemoryCustomerRepository>) -> Router {
        router().with_state(app_state_with(repo.clone()))
    }

    async fn create_acme(repo: &Arc<InMemoryCustomerRepository>) -> String {
        let (status, json) = send(
            app(repo),
            "POST",
            "/",
            Some(json!({ "customerName": "Acme Homes", "customerType": "PRODUCTION" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_create_customer_returns_201_with_defaults() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());

        // Act
        let (status, json) = send(
            app(&repo),
            "POST",
            "/",
            Some(json!({ "customerName": "Acme Homes", "customerType": "SEMI_CUSTOM" })),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["customerName"], "Acme Homes");
        assert_eq!(json["customerType"], "SEMI_CUSTOM");
        assert_eq!(json["isActive"], true);
        assert!(json["primaryContactId"].is_null());
    }

    #[tokio::test]
    async fn test_create_customer_with_blank_name_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(
            app(&repo),
            "POST",
            "/",
            Some(json!({ "customerName": "  ", "customerType": "PRODUCTION" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_create_customer_with_unknown_type_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(
            app(&repo),
            "POST",
            "/",
            Some(json!({ "customerName": "Acme", "customerType": "MODULAR" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert!(repo.applied_batches().is_empty());
    }

    #[tokio::test]
    async fn test_create_customer_without_name_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(
            app(&repo),
            "POST",
            "/",
            Some(json!({ "customerType": "PRODUCTION" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
        assert!(json["message"].as_str().unwrap().contains("customerName"));
    }

    #[tokio::test]
    async fn test_list_customers_with_malformed_filter_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(app(&repo), "GET", "/?isActive=maybe", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_get_customer_includes_relations_by_default() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let id = create_acme(&repo).await;

        // Act
        let (status, full) = send(app(&repo), "GET", &format!("/{id}"), None).await;
        let (_, bare) = send(
            app(&repo),
            "GET",
            &format!("/{id}?includeRelations=false"),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(full["contacts"], json!([]));
        assert_eq!(full["pricingTiers"], json!([]));
        assert_eq!(full["externalIds"], json!([]));
        assert_eq!(bare["customerName"], "Acme Homes");
        assert!(bare.get("contacts").is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_customer_returns_404() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(
            app(&repo),
            "GET",
            &format!("/{}", Uuid::new_v4()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }

    #[tokio::test]
    async fn test_get_customer_with_malformed_id_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(app(&repo), "GET", "/not-a-uuid", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_update_customer_patches_given_fields() {
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let id = create_acme(&repo).await;

        let (status, json) = send(
            app(&repo),
            "PUT",
            &format!("/{id}"),
            Some(json!({ "notes": "Prefers email" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["notes"], "Prefers email");
        assert_eq!(json["customerName"], "Acme Homes");
    }

    #[tokio::test]
    async fn test_soft_delete_returns_204_and_deactivates() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let id = create_acme(&repo).await;
        repo.add_jobs(id.parse().unwrap(), 1);

        // Act
        let (status, _) = send(app(&repo), "DELETE", &format!("/{id}"), None).await;

        // Assert
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, json) = send(app(&repo), "GET", &format!("/{id}"), None).await;
        assert_eq!(json["isActive"], false);
    }

    #[tokio::test]
    async fn test_hard_delete_with_jobs_returns_409() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let id = create_acme(&repo).await;
        repo.add_jobs(id.parse().unwrap(), 2);

        // Act
        let (status, json) = send(app(&repo), "DELETE", &format!("/{id}?hard=true"), None).await;

        // Assert
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "has_dependencies");
        let (status, _) = send(app(&repo), "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_hard_delete_without_jobs_removes_customer() {
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let id = create_acme(&repo).await;

        let (status, _) = send(app(&repo), "DELETE", &format!("/{id}?hard=true"), None).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app(&repo), "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_customers_filters_by_type_and_paginates() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        for (name, customer_type) in [
            ("Cedar Homes", "PRODUCTION"),
            ("Alder Homes", "PRODUCTION"),
            ("Birch Custom", "FULL_CUSTOM"),
        ] {
            send(
                app(&repo),
                "POST",
                "/",
                Some(json!({ "customerName": name, "customerType": customer_type })),
            )
            .await;
        }

        // Act
        let (status, json) = send(
            app(&repo),
            "GET",
            "/?customerType=PRODUCTION&page=1&limit=1",
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["customerName"], "Alder Homes");
        assert_eq!(json["pagination"]["total"], 2);
        assert_eq!(json["pagination"]["totalPages"], 2);
    }

    #[tokio::test]
    async fn test_list_customers_rejects_oversized_limit() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(app(&repo), "GET", "/?limit=500", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_find_by_unknown_external_id_returns_404() {
        let repo = Arc::new(InMemoryCustomerRepository::new());

        let (status, json) = send(app(&repo), "GET", "/external/SALES_1440/X-1", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["message"].as_str().unwrap().contains("SALES_1440:X-1"));
    }

    #[tokio::test]
    async fn test_failing_repository_returns_500() {
        let app = router().with_state(app_state_with(Arc::new(FailingCustomerRepository)));

        let (status, json) = send(
            app,
            "POST",
            "/",
            Some(json!({ "customerName": "Acme", "customerType": "PRODUCTION" })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "infrastructure_error");
    }
}
