//! Query handlers for the Customers context.
//!
//! Read-only lookups that return entities or view DTOs. Nothing here records
//! changes.

use mindflow_core::clock::Clock;
use mindflow_core::error::{DomainError, EntityKind};
use mindflow_core::pagination::{Page, PageRequest};
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers::load_account;
use crate::domain::entities::{Contact, Customer, ExternalIdMapping, PricingTier};
use crate::domain::pricing;
use crate::domain::repository::{CustomerFilter, CustomerRepository};

/// A customer, optionally with its child records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    /// The customer row, flattened into the view.
    #[serde(flatten)]
    pub customer: Customer,
    /// Contacts, primary first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,
    /// Pricing tiers, latest effective date first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_tiers: Option<Vec<PricingTier>>,
    /// External ID mappings, oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<ExternalIdMapping>>,
}

/// Parameters for listing customers.
#[derive(Debug, Clone, Default)]
pub struct ListCustomersQuery {
    /// Row filter.
    pub filter: CustomerFilter,
    /// Which page to return.
    pub page: PageRequest,
}

fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| {
        b.is_primary
            .cmp(&a.is_primary)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn sort_pricing_tiers(tiers: &mut [PricingTier]) {
    tiers.sort_by(|a, b| pricing::precedence(b, a));
}

fn sort_external_ids(mappings: &mut [ExternalIdMapping]) {
    mappings.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Retrieves a customer. With `include_relations`, contacts, pricing tiers
/// and external IDs are loaded too.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub async fn get_customer_by_id(
    customer_id: Uuid,
    include_relations: bool,
    repo: &dyn CustomerRepository,
) -> Result<CustomerView, DomainError> {
    if !include_relations {
        let customer = repo
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found(EntityKind::Customer, customer_id))?;
        return Ok(CustomerView {
            customer,
            contacts: None,
            pricing_tiers: None,
            external_ids: None,
        });
    }

    let snapshot = repo
        .load(customer_id)
        .await?
        .ok_or_else(|| DomainError::not_found(EntityKind::Customer, customer_id))?;
    let mut contacts = snapshot.contacts;
    let mut pricing_tiers = snapshot.pricing_tiers;
    let mut external_ids = snapshot.external_ids;
    sort_contacts(&mut contacts);
    sort_pricing_tiers(&mut pricing_tiers);
    sort_external_ids(&mut external_ids);

    Ok(CustomerView {
        customer: snapshot.customer,
        contacts: Some(contacts),
        pricing_tiers: Some(pricing_tiers),
        external_ids: Some(external_ids),
    })
}

/// Lists customers ordered by name.
///
/// # Errors
///
/// Returns the repository's error if the lookup fails.
pub async fn list_customers(
    query: &ListCustomersQuery,
    repo: &dyn CustomerRepository,
) -> Result<Page<Customer>, DomainError> {
    repo.list_customers(&query.filter, query.page).await
}

/// Lists a customer's contacts, primary first, then oldest first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub async fn list_contacts(
    customer_id: Uuid,
    repo: &dyn CustomerRepository,
) -> Result<Vec<Contact>, DomainError> {
    let account = load_account(customer_id, repo).await?;
    let mut contacts = account.contacts().to_vec();
    sort_contacts(&mut contacts);
    Ok(contacts)
}

/// Retrieves one contact of a customer.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist or the
/// contact does not belong to it.
pub async fn get_contact(
    customer_id: Uuid,
    contact_id: Uuid,
    repo: &dyn CustomerRepository,
) -> Result<Contact, DomainError> {
    let account = load_account(customer_id, repo).await?;
    account
        .contacts()
        .iter()
        .find(|c| c.id == contact_id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(EntityKind::Contact, contact_id))
}

/// Lists a customer's pricing tiers, latest effective date first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub async fn list_pricing_tiers(
    customer_id: Uuid,
    repo: &dyn CustomerRepository,
) -> Result<Vec<PricingTier>, DomainError> {
    let account = load_account(customer_id, repo).await?;
    let mut tiers = account.pricing_tiers().to_vec();
    sort_pricing_tiers(&mut tiers);
    Ok(tiers)
}

/// Returns the pricing tier in force now, or `None` if no tier applies.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub async fn get_current_pricing_tier(
    customer_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Option<PricingTier>, DomainError> {
    let account = load_account(customer_id, repo).await?;
    Ok(account.current_pricing_tier(clock.now()).cloned())
}

/// Lists a customer's external ID mappings, oldest first.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub async fn list_external_ids(
    customer_id: Uuid,
    repo: &dyn CustomerRepository,
) -> Result<Vec<ExternalIdMapping>, DomainError> {
    let account = load_account(customer_id, repo).await?;
    let mut mappings = account.external_ids().to_vec();
    sort_external_ids(&mut mappings);
    Ok(mappings)
}

/// Resolves a customer, with relations, from its identifier in an external
/// system. The comparison is exact and case-sensitive.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no customer is mapped to the pair.
pub async fn find_customer_by_external_id(
    external_system: &str,
    external_customer_id: &str,
    repo: &dyn CustomerRepository,
) -> Result<CustomerView, DomainError> {
    let not_found = || DomainError::NotFound {
        entity: EntityKind::Customer,
        id: format!("{external_system}:{external_customer_id}"),
    };
    let customer_id = repo
        .find_customer_id_by_external_id(external_system, external_customer_id)
        .await?
        .ok_or_else(not_found)?;
    match get_customer_by_id(customer_id, true, repo).await {
        Err(DomainError::NotFound { .. }) => Err(not_found()),
        other => other,
    }
}
