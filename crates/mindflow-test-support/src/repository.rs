//! `CustomerRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mindflow_core::error::{DomainError, EntityKind};
use mindflow_core::pagination::{Page, PageRequest};
use mindflow_customers::domain::changes::CustomerChange;
use mindflow_customers::domain::entities::{Customer, CustomerSnapshot};
use mindflow_customers::domain::repository::{CustomerFilter, CustomerRepository};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    customers: HashMap<Uuid, CustomerSnapshot>,
    jobs: HashMap<Uuid, i64>,
    applied: Vec<(Uuid, i64, Vec<CustomerChange>)>,
}

/// An in-memory repository with the Postgres store's aggregate guarantees:
/// version checks, all-or-nothing batches, one primary contact per customer,
/// one mapping per external system, and no hard delete while jobs exist.
/// Column lengths and CHECK constraints are not enforced.
#[derive(Debug, Default)]
pub struct InMemoryCustomerRepository {
    state: Mutex<State>,
}

impl InMemoryCustomerRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` jobs referencing `customer_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn add_jobs(&self, customer_id: Uuid, count: i64) {
        *self
            .state
            .lock()
            .unwrap()
            .jobs
            .entry(customer_id)
            .or_default() += count;
    }

    /// Simulates a concurrent writer by bumping the stored version.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned or the customer is unknown.
    pub fn bump_version(&self, customer_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let snapshot = state
            .customers
            .get_mut(&customer_id)
            .expect("bump_version on unknown customer");
        snapshot.version += 1;
    }

    /// Returns the stored aggregate, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshot(&self, customer_id: Uuid) -> Option<CustomerSnapshot> {
        self.state.lock().unwrap().customers.get(&customer_id).cloned()
    }

    /// Returns every successfully applied batch as
    /// `(customer_id, expected_version, changes)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn applied_batches(&self) -> Vec<(Uuid, i64, Vec<CustomerChange>)> {
        self.state.lock().unwrap().applied.clone()
    }
}

fn unique_violation(constraint: &str) -> DomainError {
    DomainError::Infrastructure(format!("unique constraint violated: {constraint}"))
}

fn apply_one(
    working: &mut Option<CustomerSnapshot>,
    jobs: i64,
    customer_id: Uuid,
    change: &CustomerChange,
) -> Result<(), DomainError> {
    if let CustomerChange::CustomerCreated(customer) = change {
        *working = Some(CustomerSnapshot {
            customer: customer.clone(),
            contacts: Vec::new(),
            pricing_tiers: Vec::new(),
            external_ids: Vec::new(),
            version: 0,
        });
        return Ok(());
    }
    if let CustomerChange::CustomerDeleted { .. } = change {
        if jobs > 0 {
            return Err(DomainError::HasDependencies {
                customer_id,
                job_count: jobs,
            });
        }
        *working = None;
        return Ok(());
    }

    let snapshot = working
        .as_mut()
        .ok_or_else(|| DomainError::not_found(EntityKind::Customer, customer_id))?;
    match change {
        CustomerChange::CustomerCreated(_) | CustomerChange::CustomerDeleted { .. } => {}
        CustomerChange::CustomerUpdated(customer) => snapshot.customer = customer.clone(),
        CustomerChange::ContactAdded(contact) => {
            if contact.is_primary && snapshot.contacts.iter().any(|c| c.is_primary) {
                return Err(unique_violation("customer_contacts_one_primary"));
            }
            snapshot.contacts.push(contact.clone());
        }
        CustomerChange::ContactUpdated(contact) => {
            if contact.is_primary
                && snapshot
                    .contacts
                    .iter()
                    .any(|c| c.is_primary && c.id != contact.id)
            {
                return Err(unique_violation("customer_contacts_one_primary"));
            }
            let slot = snapshot
                .contacts
                .iter_mut()
                .find(|c| c.id == contact.id)
                .ok_or_else(|| DomainError::not_found(EntityKind::Contact, contact.id))?;
            *slot = contact.clone();
        }
        CustomerChange::ContactRemoved { contact_id } => {
            snapshot.contacts.retain(|c| c.id != *contact_id);
            if snapshot.customer.primary_contact_id == Some(*contact_id) {
                snapshot.customer.primary_contact_id = None;
            }
        }
        CustomerChange::PricingTierAdded(tier) => snapshot.pricing_tiers.push(tier.clone()),
        CustomerChange::PricingTierUpdated(tier) => {
            let slot = snapshot
                .pricing_tiers
                .iter_mut()
                .find(|t| t.id == tier.id)
                .ok_or_else(|| DomainError::not_found(EntityKind::PricingTier, tier.id))?;
            *slot = tier.clone();
        }
        CustomerChange::PricingTierRemoved { tier_id } => {
            snapshot.pricing_tiers.retain(|t| t.id != *tier_id);
        }
        CustomerChange::ExternalIdMapped(mapping) => {
            if snapshot
                .external_ids
                .iter()
                .any(|m| m.external_system == mapping.external_system)
            {
                return Err(DomainError::Duplicate {
                    external_system: mapping.external_system.clone(),
                    external_customer_id: mapping.external_customer_id.clone(),
                });
            }
            snapshot.external_ids.push(mapping.clone());
        }
        CustomerChange::ExternalIdUpdated(mapping) => {
            let slot = snapshot
                .external_ids
                .iter_mut()
                .find(|m| m.id == mapping.id)
                .ok_or_else(|| DomainError::not_found(EntityKind::ExternalId, mapping.id))?;
            *slot = mapping.clone();
        }
        CustomerChange::ExternalIdRemoved { external_id } => {
            snapshot.external_ids.retain(|m| m.id != *external_id);
        }
    }
    Ok(())
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn load(&self, customer_id: Uuid) -> Result<Option<CustomerSnapshot>, DomainError> {
        Ok(self.snapshot(customer_id))
    }

    async fn find_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DomainError> {
        Ok(self.snapshot(customer_id).map(|s| s.customer))
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Result<Page<Customer>, DomainError> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<Customer> = state
            .customers
            .values()
            .map(|s| &s.customer)
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.customer_name
                .cmp(&b.customer_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit() as usize)
            .collect();
        Ok(Page::new(data, page, total))
    }

    async fn find_customer_id_by_external_id(
        &self,
        external_system: &str,
        external_customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .customers
            .values()
            .flat_map(|s| s.external_ids.iter())
            .filter(|m| {
                m.external_system == external_system
                    && m.external_customer_id == external_customer_id
            })
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .map(|m| m.customer_id))
    }

    async fn count_jobs(&self, customer_id: Uuid) -> Result<i64, DomainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .get(&customer_id)
            .copied()
            .unwrap_or(0))
    }

    async fn apply_changes(
        &self,
        customer_id: Uuid,
        expected_version: i64,
        changes: &[CustomerChange],
    ) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        let current = state.customers.get(&customer_id).cloned();

        match (&current, expected_version) {
            (Some(existing), 0) => {
                return Err(DomainError::ConcurrencyConflict {
                    customer_id,
                    expected: 0,
                    actual: existing.version,
                });
            }
            (None, v) if v != 0 => {
                return Err(DomainError::not_found(EntityKind::Customer, customer_id));
            }
            (Some(existing), v) if existing.version != v => {
                return Err(DomainError::ConcurrencyConflict {
                    customer_id,
                    expected: v,
                    actual: existing.version,
                });
            }
            _ => {}
        }

        let jobs = state.jobs.get(&customer_id).copied().unwrap_or(0);
        let mut working = current;
        for change in changes {
            apply_one(&mut working, jobs, customer_id, change)?;
        }

        match working {
            Some(mut snapshot) => {
                snapshot.version = expected_version + 1;
                state.customers.insert(customer_id, snapshot);
            }
            None => {
                state.customers.remove(&customer_id);
            }
        }
        state
            .applied
            .push((customer_id, expected_version, changes.to_vec()));
        Ok(())
    }
}

/// A repository whose every call fails with an infrastructure error.
#[derive(Debug)]
pub struct FailingCustomerRepository;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl CustomerRepository for FailingCustomerRepository {
    async fn load(&self, _customer_id: Uuid) -> Result<Option<CustomerSnapshot>, DomainError> {
        Err(connection_refused())
    }

    async fn find_customer(&self, _customer_id: Uuid) -> Result<Option<Customer>, DomainError> {
        Err(connection_refused())
    }

    async fn list_customers(
        &self,
        _filter: &CustomerFilter,
        _page: PageRequest,
    ) -> Result<Page<Customer>, DomainError> {
        Err(connection_refused())
    }

    async fn find_customer_id_by_external_id(
        &self,
        _external_system: &str,
        _external_customer_id: &str,
    ) -> Result<Option<Uuid>, DomainError> {
        Err(connection_refused())
    }

    async fn count_jobs(&self, _customer_id: Uuid) -> Result<i64, DomainError> {
        Err(connection_refused())
    }

    async fn apply_changes(
        &self,
        _customer_id: Uuid,
        _expected_version: i64,
        _changes: &[CustomerChange],
    ) -> Result<(), DomainError> {
        Err(connection_refused())
    }
}
