//! Command handlers for the Customers context.
//!
//! Each handler validates its command, loads the aggregate, runs the domain
//! operation and persists the recorded changes at the loaded version.

use mindflow_core::aggregate::AggregateRoot;
use mindflow_core::clock::Clock;
use mindflow_core::command::Command;
use mindflow_core::error::{DomainError, EntityKind};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::CustomerAccount;
use crate::domain::changes::CustomerChange;
use crate::domain::commands::{
    AddContact, AddPricingTier, CreateCustomer, DeleteCustomer, DeleteMode, MapExternalId,
    RemoveContact, RemoveExternalId, RemovePricingTier, UpdateContact, UpdateCustomer,
    UpdateExternalId, UpdatePricingTier,
};
use crate::domain::entities::{Contact, Customer, ExternalIdMapping, PricingTier};
use crate::domain::repository::CustomerRepository;
use crate::domain::validation;

/// Loads the aggregate for `customer_id`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist.
pub(crate) async fn load_account(
    customer_id: Uuid,
    repo: &dyn CustomerRepository,
) -> Result<CustomerAccount, DomainError> {
    repo.load(customer_id)
        .await?
        .map(CustomerAccount::from_snapshot)
        .ok_or_else(|| DomainError::not_found(EntityKind::Customer, customer_id))
}

async fn persist(
    command: &dyn Command,
    account: &mut CustomerAccount,
    repo: &dyn CustomerRepository,
) -> Result<(), DomainError> {
    let changes = account.take_pending_changes();
    if changes.is_empty() {
        return Ok(());
    }
    debug!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        customer_id = %account.aggregate_id(),
        expected_version = account.version(),
        change_count = changes.len(),
        "applying customer changes"
    );
    repo.apply_changes(account.aggregate_id(), account.version(), &changes)
        .await?;
    info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        customer_id = %account.aggregate_id(),
        changes = ?changes.iter().map(CustomerChange::change_type).collect::<Vec<_>>(),
        "customer changes applied"
    );
    Ok(())
}

/// Handles `CreateCustomer`: creates an active customer with no children.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid input, or the repository's
/// error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_customer(
    command: &CreateCustomer,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Customer, DomainError> {
    validation::create_customer(command)?;

    let mut account = CustomerAccount::create(Uuid::now_v7(), command, clock);
    persist(command, &mut account, repo).await?;

    Ok(account.customer().clone())
}

/// Handles `UpdateCustomer`: patches the customer row, optionally
/// designating a new primary contact.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or the designated contact
/// does not exist, `DomainError::Validation` for invalid input, or the
/// repository's error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id))]
pub async fn handle_update_customer(
    command: &UpdateCustomer,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Customer, DomainError> {
    validation::update_customer(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    account.update(command, clock)?;
    persist(command, &mut account, repo).await?;

    Ok(account.customer().clone())
}

/// Handles `DeleteCustomer`.
///
/// A soft delete marks the customer inactive. A hard delete removes the
/// customer and its children, and is refused while jobs reference it; the
/// repository re-checks jobs inside the deleting transaction.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist,
/// `DomainError::HasDependencies` if a hard delete finds jobs, or the
/// repository's error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, mode = ?command.mode))]
pub async fn handle_delete_customer(
    command: &DeleteCustomer,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<(), DomainError> {
    let mut account = load_account(command.customer_id, repo).await?;
    match command.mode {
        DeleteMode::Soft => account.deactivate(clock),
        DeleteMode::Hard => {
            let job_count = repo.count_jobs(command.customer_id).await?;
            account.delete(job_count)?;
        }
    }
    persist(command, &mut account, repo).await
}

/// Handles `AddContact`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist,
/// `DomainError::Validation` for invalid input, or the repository's error if
/// persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id))]
pub async fn handle_add_contact(
    command: &AddContact,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Contact, DomainError> {
    validation::add_contact(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let contact = account.add_contact(Uuid::now_v7(), command, clock);
    persist(command, &mut account, repo).await?;

    Ok(contact)
}

/// Handles `UpdateContact`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or contact does not exist,
/// `DomainError::Validation` for invalid input, or the repository's error if
/// persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, contact_id = %command.contact_id))]
pub async fn handle_update_contact(
    command: &UpdateContact,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Contact, DomainError> {
    validation::update_contact(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let contact = account.update_contact(command, clock)?;
    persist(command, &mut account, repo).await?;

    Ok(contact)
}

/// Handles `RemoveContact`, promoting a successor if the primary contact was
/// removed. Returns the promoted contact's id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or contact does not exist,
/// or the repository's error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, contact_id = %command.contact_id))]
pub async fn handle_remove_contact(
    command: &RemoveContact,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<Option<Uuid>, DomainError> {
    let mut account = load_account(command.customer_id, repo).await?;
    let promoted = account.remove_contact(command.contact_id, clock)?;
    persist(command, &mut account, repo).await?;

    Ok(promoted)
}

/// Handles `AddPricingTier`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist,
/// `DomainError::Validation` for invalid input, or the repository's error if
/// persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id))]
pub async fn handle_add_pricing_tier(
    command: &AddPricingTier,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<PricingTier, DomainError> {
    validation::add_pricing_tier(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let tier = account.add_pricing_tier(Uuid::now_v7(), command, clock);
    persist(command, &mut account, repo).await?;

    Ok(tier)
}

/// Handles `UpdatePricingTier`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or tier does not exist,
/// `DomainError::Validation` for invalid input, or the repository's error if
/// persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, tier_id = %command.tier_id))]
pub async fn handle_update_pricing_tier(
    command: &UpdatePricingTier,
    repo: &dyn CustomerRepository,
) -> Result<PricingTier, DomainError> {
    validation::update_pricing_tier(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let tier = account.update_pricing_tier(command)?;
    persist(command, &mut account, repo).await?;

    Ok(tier)
}

/// Handles `RemovePricingTier`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or tier does not exist,
/// or the repository's error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, tier_id = %command.tier_id))]
pub async fn handle_remove_pricing_tier(
    command: &RemovePricingTier,
    repo: &dyn CustomerRepository,
) -> Result<(), DomainError> {
    let mut account = load_account(command.customer_id, repo).await?;
    account.remove_pricing_tier(command.tier_id)?;
    persist(command, &mut account, repo).await
}

/// Handles `MapExternalId`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer does not exist,
/// `DomainError::Duplicate` if the customer already has a mapping for the
/// system, `DomainError::Validation` for invalid input, or the repository's
/// error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, external_system = %command.external_system))]
pub async fn handle_map_external_id(
    command: &MapExternalId,
    clock: &dyn Clock,
    repo: &dyn CustomerRepository,
) -> Result<ExternalIdMapping, DomainError> {
    validation::map_external_id(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let mapping = account.map_external_id(Uuid::now_v7(), command, clock)?;
    persist(command, &mut account, repo).await?;

    Ok(mapping)
}

/// Handles `UpdateExternalId`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or mapping does not exist,
/// `DomainError::Validation` for invalid input, or the repository's error if
/// persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, external_id = %command.external_id))]
pub async fn handle_update_external_id(
    command: &UpdateExternalId,
    repo: &dyn CustomerRepository,
) -> Result<ExternalIdMapping, DomainError> {
    validation::update_external_id(command)?;

    let mut account = load_account(command.customer_id, repo).await?;
    let mapping = account.update_external_id(command)?;
    persist(command, &mut account, repo).await?;

    Ok(mapping)
}

/// Handles `RemoveExternalId`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the customer or mapping does not exist,
/// or the repository's error if persisting fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, customer_id = %command.customer_id, external_id = %command.external_id))]
pub async fn handle_remove_external_id(
    command: &RemoveExternalId,
    repo: &dyn CustomerRepository,
) -> Result<(), DomainError> {
    let mut account = load_account(command.customer_id, repo).await?;
    account.remove_external_id(command.external_id)?;
    persist(command, &mut account, repo).await
}
