//! Persistence port for the customer aggregate.

use async_trait::async_trait;
use mindflow_core::error::DomainError;
use mindflow_core::pagination::{Page, PageRequest};
use uuid::Uuid;

use super::changes::CustomerChange;
use super::entities::{Customer, CustomerSnapshot, CustomerType};

/// Criteria for listing customers. Absent criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    /// Case-insensitive substring of the name or notes.
    pub search: Option<String>,
    /// Exact builder type.
    pub customer_type: Option<CustomerType>,
    /// Active or soft-deleted customers only.
    pub is_active: Option<bool>,
}

impl CustomerFilter {
    /// Evaluates the filter against a single customer.
    #[must_use]
    pub fn matches(&self, customer: &Customer) -> bool {
        let search_hit = self.search.as_deref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            customer.customer_name.to_lowercase().contains(&needle)
                || customer
                    .notes
                    .as_deref()
                    .is_some_and(|notes| notes.to_lowercase().contains(&needle))
        });
        search_hit
            && self
                .customer_type
                .is_none_or(|ty| customer.customer_type == ty)
            && self.is_active.is_none_or(|active| customer.is_active == active)
    }
}

/// Storage for customers and their child records.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Loads a customer with every contact, pricing tier and external ID
    /// mapping, plus the aggregate version.
    async fn load(&self, customer_id: Uuid) -> Result<Option<CustomerSnapshot>, DomainError>;

    /// Loads only the customer row.
    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DomainError>;

    /// Lists customers matching `filter`, ordered by name.
    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, DomainError>;

    /// Finds the customer mapped to `external_customer_id` in
    /// `external_system`. If several customers carry the same pair, the
    /// earliest mapping wins.
    async fn find_customer_id_by_external_id(
        &self,
        external_system: &str,
        external_customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError>;

    /// Counts jobs that reference the customer.
    async fn count_jobs(&self, customer_id: Uuid) -> Result<i64, DomainError>;

    /// Applies `changes` in order, all or nothing.
    ///
    /// `expected_version` is the version the aggregate was loaded at, or 0
    /// for a customer that does not exist yet. A mismatch fails with
    /// `DomainError::ConcurrencyConflict` and writes nothing.
    async fn apply_changes(
        &self,
        customer_id: Uuid,
        expected_version: i64,
        changes: &[CustomerChange],
    ) -> Result<(), DomainError>;
}
