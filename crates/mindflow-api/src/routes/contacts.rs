//! Routes for customer contacts.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use mindflow_customers::application::{command_handlers, query_handlers};
use mindflow_customers::domain::commands;
use mindflow_customers::domain::entities::Contact;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams};
use crate::state::AppState;

fn default_receives_notifications() -> bool {
    true
}

/// Request body for POST /{id}/contacts.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactRequest {
    /// Full name.
    pub contact_name: String,
    /// Job role.
    pub role: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether the contact is sent notifications. Defaults to `true`.
    #[serde(default = "default_receives_notifications")]
    pub receives_notifications: bool,
    /// Make this the primary contact. A customer's first contact is always
    /// primary.
    #[serde(default)]
    pub is_primary: bool,
}

/// Request body for PUT /{id}/contacts/{contact_id}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactRequest {
    /// New full name.
    pub contact_name: Option<String>,
    /// New role.
    pub role: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New notification preference.
    pub receives_notifications: Option<bool>,
    /// New primary flag.
    pub is_primary: Option<bool>,
}

/// GET /{id}/contacts
#[instrument(skip(state))]
async fn list_contacts(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = query_handlers::list_contacts(id, &*state.customers).await?;
    Ok(Json(contacts))
}

/// POST /{id}/contacts
#[instrument(skip(state, request), fields(customer_id = %id))]
async fn add_contact(
    State(state): State<AppState>,
    PathParams(id): PathParams<Uuid>,
    JsonBody(request): JsonBody<AddContactRequest>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    let command = commands::AddContact {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        contact_name: request.contact_name,
        role: request.role,
        email: request.email,
        phone: request.phone,
        receives_notifications: request.receives_notifications,
        is_primary: request.is_primary,
    };

    info!(correlation_id = %command.correlation_id, "handling add_contact command");

    let contact =
        command_handlers::handle_add_contact(&command, state.clock.as_ref(), &*state.customers)
            .await?;

    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /{id}/contacts/{contact_id}
#[instrument(skip(state))]
async fn get_contact(
    State(state): State<AppState>,
    PathParams((id, contact_id)): PathParams<(Uuid, Uuid)>,
) -> Result<Json<Contact>, ApiError> {
    let contact = query_handlers::get_contact(id, contact_id, &*state.customers).await?;
    Ok(Json(contact))
}

/// PUT /{id}/contacts/{contact_id}
#[instrument(skip(state, request), fields(customer_id = %id, contact_id = %contact_id))]
async fn update_contact(
    State(state): State<AppState>,
    PathParams((id, contact_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(request): JsonBody<UpdateContactRequest>,
) -> Result<Json<Contact>, ApiError> {
    let command = commands::UpdateContact {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        contact_id,
        contact_name: request.contact_name,
        role: request.role,
        email: request.email,
        phone: request.phone,
        receives_notifications: request.receives_notifications,
        is_primary: request.is_primary,
    };

    info!(correlation_id = %command.correlation_id, "handling update_contact command");

    let contact =
        command_handlers::handle_update_contact(&command, state.clock.as_ref(), &*state.customers)
            .await?;

    Ok(Json(contact))
}

/// DELETE /{id}/contacts/{contact_id}
#[instrument(skip(state), fields(customer_id = %id, contact_id = %contact_id))]
async fn remove_contact(
    State(state): State<AppState>,
    PathParams((id, contact_id)): PathParams<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let command = commands::RemoveContact {
        correlation_id: Uuid::new_v4(),
        customer_id: id,
        contact_id,
    };

    info!(correlation_id = %command.correlation_id, "handling remove_contact command");

    let promoted =
        command_handlers::handle_remove_contact(&command, state.clock.as_ref(), &*state.customers)
            .await?;
    if let Some(promoted) = promoted {
        info!(correlation_id = %command.correlation_id, %promoted, "promoted new primary contact");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Returns the router for contacts, nested under a customer.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/contacts", get(list_contacts).post(add_contact))
        .route(
            "/{id}/contacts/{contact_id}",
            put(update_contact).get(get_contact).delete(remove_contact),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use mindflow_test_support::InMemoryCustomerRepository;
    use serde_json::{Value, json};

    use crate::routes::customers;
    use crate::routes::testing::{app_state_with, send};

    fn app(repo: &Arc<InMemoryCustomerRepository>) -> axum::Router {
        customers::router().with_state(app_state_with(repo.clone()))
    }

    async fn create_customer(repo: &Arc<InMemoryCustomerRepository>) -> String {
        let (_, json) = send(
            app(repo),
            "POST",
            "/",
            Some(json!({ "customerName": "Acme Homes", "customerType": "PRODUCTION" })),
        )
        .await;
        json["id"].as_str().unwrap().to_owned()
    }

    async fn add(repo: &Arc<InMemoryCustomerRepository>, customer_id: &str, body: Value) -> Value {
        let (status, json) = send(
            app(repo),
            "POST",
            &format!("/{customer_id}/contacts"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json
    }

    #[tokio::test]
    async fn test_first_contact_becomes_primary_with_defaults() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let customer_id = create_customer(&repo).await;

        // Act
        let jane = add(&repo, &customer_id, json!({ "contactName": "Jane" })).await;

        // Assert
        assert_eq!(jane["isPrimary"], true);
        assert_eq!(jane["receivesNotifications"], true);
        let (_, customer) = send(app(&repo), "GET", &format!("/{customer_id}"), None).await;
        assert_eq!(customer["primaryContactId"], jane["id"]);
    }

    #[tokio::test]
    async fn test_new_primary_contact_demotes_previous() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let customer_id = create_customer(&repo).await;
        let jane = add(&repo, &customer_id, json!({ "contactName": "Jane" })).await;

        // Act
        let bob = add(
            &repo,
            &customer_id,
            json!({ "contactName": "Bob", "isPrimary": true }),
        )
        .await;

        // Assert
        let (_, contacts) = send(
            app(&repo),
            "GET",
            &format!("/{customer_id}/contacts"),
            None,
        )
        .await;
        assert_eq!(contacts[0]["id"], bob["id"]);
        assert_eq!(contacts[1]["id"], jane["id"]);
        assert_eq!(contacts[1]["isPrimary"], false);
    }

    #[tokio::test]
    async fn test_removing_primary_promotes_remaining_contact() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let customer_id = create_customer(&repo).await;
        let jane = add(&repo, &customer_id, json!({ "contactName": "Jane" })).await;
        let bob = add(&repo, &customer_id, json!({ "contactName": "Bob" })).await;

        // Act
        let (status, _) = send(
            app(&repo),
            "DELETE",
            &format!("/{customer_id}/contacts/{}", jane["id"].as_str().unwrap()),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, customer) = send(app(&repo), "GET", &format!("/{customer_id}"), None).await;
        assert_eq!(customer["primaryContactId"], bob["id"]);
        assert_eq!(customer["contacts"][0]["isPrimary"], true);
    }

    #[tokio::test]
    async fn test_update_contact_with_bad_email_returns_400() {
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let customer_id = create_customer(&repo).await;
        let jane = add(&repo, &customer_id, json!({ "contactName": "Jane" })).await;

        let (status, json) = send(
            app(&repo),
            "PUT",
            &format!("/{customer_id}/contacts/{}", jane["id"].as_str().unwrap()),
            Some(json!({ "email": "not-an-email" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }

    #[tokio::test]
    async fn test_contact_of_another_customer_returns_404() {
        // Arrange
        let repo = Arc::new(InMemoryCustomerRepository::new());
        let acme = create_customer(&repo).await;
        let other = create_customer(&repo).await;
        let jane = add(&repo, &acme, json!({ "contactName": "Jane" })).await;

        // Act
        let (status, json) = send(
            app(&repo),
            "GET",
            &format!("/{other}/contacts/{}", jane["id"].as_str().unwrap()),
            None,
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not_found");
    }
}
