//! Aggregate root for the Customers context.
//!
//! `CustomerAccount` holds a customer together with its contacts, pricing
//! tiers and external ID mappings, and is the only place their consistency
//! rules are enforced:
//!
//! - at most one contact is primary, a first contact is always primary, and
//!   `Customer::primary_contact_id` tracks the primary contact;
//! - a customer has at most one mapping per external system;
//! - a customer with jobs cannot be hard-deleted.
//!
//! Every mutation updates the in-memory state and records the matching
//! `CustomerChange`, so later steps of the same command see earlier ones.

use chrono::{DateTime, Utc};
use mindflow_core::aggregate::AggregateRoot;
use mindflow_core::clock::Clock;
use mindflow_core::error::{DomainError, EntityKind};
use uuid::Uuid;

use super::changes::CustomerChange;
use super::commands::{
    AddContact, AddPricingTier, CreateCustomer, MapExternalId, UpdateContact, UpdateCustomer,
    UpdateExternalId, UpdatePricingTier,
};
use super::entities::{Contact, Customer, CustomerSnapshot, ExternalIdMapping, PricingTier};
use super::pricing;
use super::validation;

/// The aggregate root for a customer and its child records.
#[derive(Debug)]
pub struct CustomerAccount {
    customer: Customer,
    contacts: Vec<Contact>,
    pricing_tiers: Vec<PricingTier>,
    external_ids: Vec<ExternalIdMapping>,
    /// Version the aggregate was loaded at; 0 for a new customer.
    version: i64,
    /// Changes pending persistence.
    pending_changes: Vec<CustomerChange>,
}

impl CustomerAccount {
    /// Creates a new, active customer with no children.
    #[must_use]
    pub fn create(customer_id: Uuid, command: &CreateCustomer, clock: &dyn Clock) -> Self {
        let now = clock.now();
        let customer = Customer {
            id: customer_id,
            customer_name: command.customer_name.clone(),
            customer_type: command.customer_type,
            pricing_tier: command.pricing_tier.clone(),
            primary_contact_id: None,
            is_active: true,
            notes: command.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        Self {
            pending_changes: vec![CustomerChange::CustomerCreated(customer.clone())],
            customer,
            contacts: Vec::new(),
            pricing_tiers: Vec::new(),
            external_ids: Vec::new(),
            version: 0,
        }
    }

    /// Rebuilds the aggregate from a stored snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: CustomerSnapshot) -> Self {
        Self {
            customer: snapshot.customer,
            contacts: snapshot.contacts,
            pricing_tiers: snapshot.pricing_tiers,
            external_ids: snapshot.external_ids,
            version: snapshot.version,
            pending_changes: Vec::new(),
        }
    }

    /// The customer row.
    #[must_use]
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    /// All contacts.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// All pricing tiers.
    #[must_use]
    pub fn pricing_tiers(&self) -> &[PricingTier] {
        &self.pricing_tiers
    }

    /// All external ID mappings.
    #[must_use]
    pub fn external_ids(&self) -> &[ExternalIdMapping] {
        &self.external_ids
    }

    /// The contact flagged primary, if any.
    #[must_use]
    pub fn primary_contact(&self) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.is_primary)
    }

    /// The pricing tier in force at `now`.
    #[must_use]
    pub fn current_pricing_tier(&self, now: DateTime<Utc>) -> Option<&PricingTier> {
        pricing::current_tier(&self.pricing_tiers, now)
    }

    // --- customer ---

    /// Patches the customer row. Designating a primary contact demotes the
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if `primary_contact_id` does not name
    /// one of this customer's contacts.
    pub fn update(&mut self, command: &UpdateCustomer, clock: &dyn Clock) -> Result<(), DomainError> {
        if let Some(contact_id) = command.primary_contact_id {
            self.contact_index(contact_id)?;
        }

        if let Some(name) = &command.customer_name {
            self.customer.customer_name.clone_from(name);
        }
        if let Some(customer_type) = command.customer_type {
            self.customer.customer_type = customer_type;
        }
        if let Some(tier) = &command.pricing_tier {
            self.customer.pricing_tier = Some(tier.clone());
        }
        if let Some(active) = command.is_active {
            self.customer.is_active = active;
        }
        if let Some(notes) = &command.notes {
            self.customer.notes = Some(notes.clone());
        }
        if let Some(contact_id) = command.primary_contact_id {
            self.promote_contact(contact_id);
            self.customer.primary_contact_id = Some(contact_id);
        }

        self.record_customer_update(clock);
        Ok(())
    }

    /// Soft-deletes the customer. Children are left untouched.
    pub fn deactivate(&mut self, clock: &dyn Clock) {
        self.customer.is_active = false;
        self.record_customer_update(clock);
    }

    /// Hard-deletes the customer and every child record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::HasDependencies` if `job_count` is positive; no
    /// change is recorded in that case.
    pub fn delete(&mut self, job_count: i64) -> Result<(), DomainError> {
        if job_count > 0 {
            return Err(DomainError::HasDependencies {
                customer_id: self.customer.id,
                job_count,
            });
        }
        self.contacts.clear();
        self.pricing_tiers.clear();
        self.external_ids.clear();
        self.pending_changes.push(CustomerChange::CustomerDeleted {
            customer_id: self.customer.id,
        });
        Ok(())
    }

    // --- contacts ---

    /// Adds a contact. A first contact is always primary; a contact added as
    /// primary demotes the previous primary first.
    pub fn add_contact(
        &mut self,
        contact_id: Uuid,
        command: &AddContact,
        clock: &dyn Clock,
    ) -> Contact {
        let is_primary = command.is_primary || self.contacts.is_empty();
        if is_primary {
            self.demote_primary_contacts(None);
        }

        let contact = Contact {
            id: contact_id,
            customer_id: self.customer.id,
            contact_name: command.contact_name.clone(),
            role: command.role.clone(),
            email: command.email.clone(),
            phone: command.phone.clone(),
            receives_notifications: command.receives_notifications,
            is_primary,
            created_at: clock.now(),
        };
        self.contacts.push(contact.clone());
        self.pending_changes
            .push(CustomerChange::ContactAdded(contact.clone()));

        if is_primary {
            self.customer.primary_contact_id = Some(contact_id);
            self.record_customer_update(clock);
        }
        contact
    }

    /// Patches a contact. Setting it primary demotes every other contact.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the contact does not belong to this
    /// customer, or `DomainError::Validation` when asked to unflag the
    /// primary contact.
    pub fn update_contact(
        &mut self,
        command: &UpdateContact,
        clock: &dyn Clock,
    ) -> Result<Contact, DomainError> {
        let index = self.contact_index(command.contact_id)?;
        if command.is_primary == Some(false) && self.contacts[index].is_primary {
            return Err(DomainError::Validation(
                "cannot unset the primary contact; designate another contact as primary instead"
                    .into(),
            ));
        }

        if command.is_primary == Some(true) {
            self.demote_primary_contacts(Some(command.contact_id));
        }

        let contact = &mut self.contacts[index];
        if let Some(name) = &command.contact_name {
            contact.contact_name.clone_from(name);
        }
        if let Some(role) = &command.role {
            contact.role = Some(role.clone());
        }
        if let Some(email) = &command.email {
            contact.email = Some(email.clone());
        }
        if let Some(phone) = &command.phone {
            contact.phone = Some(phone.clone());
        }
        if let Some(notify) = command.receives_notifications {
            contact.receives_notifications = notify;
        }
        if command.is_primary == Some(true) {
            contact.is_primary = true;
        }
        let updated = contact.clone();
        self.pending_changes
            .push(CustomerChange::ContactUpdated(updated.clone()));

        if updated.is_primary && self.customer.primary_contact_id != Some(updated.id) {
            self.customer.primary_contact_id = Some(updated.id);
            self.record_customer_update(clock);
        }
        Ok(updated)
    }

    /// Removes a contact. If it was primary, the remaining contact created
    /// earliest (smallest id on ties) is promoted. Returns the promoted
    /// contact's id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the contact does not belong to this
    /// customer.
    pub fn remove_contact(
        &mut self,
        contact_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Option<Uuid>, DomainError> {
        let index = self.contact_index(contact_id)?;
        let removed = self.contacts.remove(index);
        self.pending_changes
            .push(CustomerChange::ContactRemoved { contact_id });

        if !removed.is_primary && self.customer.primary_contact_id != Some(contact_id) {
            return Ok(None);
        }

        self.customer.primary_contact_id = None;
        let successor = self
            .contacts
            .iter_mut()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let promoted = successor.map(|next| {
            next.is_primary = true;
            next.clone()
        });
        if let Some(next) = &promoted {
            self.pending_changes
                .push(CustomerChange::ContactUpdated(next.clone()));
            self.customer.primary_contact_id = Some(next.id);
        }
        self.record_customer_update(clock);
        Ok(promoted.map(|c| c.id))
    }

    // --- pricing tiers ---

    /// Adds a pricing tier. Overlapping windows are allowed.
    pub fn add_pricing_tier(
        &mut self,
        tier_id: Uuid,
        command: &AddPricingTier,
        clock: &dyn Clock,
    ) -> PricingTier {
        let tier = PricingTier {
            id: tier_id,
            customer_id: self.customer.id,
            tier_name: command.tier_name.clone(),
            discount_percentage: command.discount_percentage,
            effective_date: command.effective_date,
            expiration_date: command.expiration_date,
            created_at: clock.now(),
        };
        self.pricing_tiers.push(tier.clone());
        self.pending_changes
            .push(CustomerChange::PricingTierAdded(tier.clone()));
        tier
    }

    /// Patches a pricing tier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the tier does not belong to this
    /// customer, or `DomainError::Validation` if the resulting window ends
    /// before it starts.
    pub fn update_pricing_tier(
        &mut self,
        command: &UpdatePricingTier,
    ) -> Result<PricingTier, DomainError> {
        let index = self
            .pricing_tiers
            .iter()
            .position(|t| t.id == command.tier_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::PricingTier, command.tier_id))?;

        let mut tier = self.pricing_tiers[index].clone();
        if let Some(name) = &command.tier_name {
            tier.tier_name.clone_from(name);
        }
        if let Some(discount) = command.discount_percentage {
            tier.discount_percentage = discount;
        }
        if let Some(effective) = command.effective_date {
            tier.effective_date = effective;
        }
        if let Some(expires) = command.expiration_date {
            tier.expiration_date = Some(expires);
        }
        validation::date_range(tier.effective_date, tier.expiration_date)?;

        self.pricing_tiers[index] = tier.clone();
        self.pending_changes
            .push(CustomerChange::PricingTierUpdated(tier.clone()));
        Ok(tier)
    }

    /// Removes a pricing tier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the tier does not belong to this
    /// customer.
    pub fn remove_pricing_tier(&mut self, tier_id: Uuid) -> Result<(), DomainError> {
        let index = self
            .pricing_tiers
            .iter()
            .position(|t| t.id == tier_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::PricingTier, tier_id))?;
        self.pricing_tiers.remove(index);
        self.pending_changes
            .push(CustomerChange::PricingTierRemoved { tier_id });
        Ok(())
    }

    // --- external IDs ---

    /// Maps the customer to a record in an external system.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Duplicate` if the customer already has a mapping
    /// for `external_system`, whatever the primary flag.
    pub fn map_external_id(
        &mut self,
        mapping_id: Uuid,
        command: &MapExternalId,
        clock: &dyn Clock,
    ) -> Result<ExternalIdMapping, DomainError> {
        if self
            .external_ids
            .iter()
            .any(|m| m.external_system == command.external_system)
        {
            return Err(DomainError::Duplicate {
                external_system: command.external_system.clone(),
                external_customer_id: command.external_customer_id.clone(),
            });
        }

        // Can only match once several mappings per system are allowed.
        if command.is_primary {
            self.demote_primary_mappings(&command.external_system, None);
        }

        let mapping = ExternalIdMapping {
            id: mapping_id,
            customer_id: self.customer.id,
            external_system: command.external_system.clone(),
            external_customer_id: command.external_customer_id.clone(),
            external_customer_name: command.external_customer_name.clone(),
            is_primary: command.is_primary,
            created_at: clock.now(),
        };
        self.external_ids.push(mapping.clone());
        self.pending_changes
            .push(CustomerChange::ExternalIdMapped(mapping.clone()));
        Ok(mapping)
    }

    /// Patches an external ID mapping.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the mapping does not belong to this
    /// customer.
    pub fn update_external_id(
        &mut self,
        command: &UpdateExternalId,
    ) -> Result<ExternalIdMapping, DomainError> {
        let index = self.external_id_index(command.external_id)?;

        if command.is_primary == Some(true) {
            let system = self.external_ids[index].external_system.clone();
            self.demote_primary_mappings(&system, Some(command.external_id));
        }

        let mapping = &mut self.external_ids[index];
        if let Some(id) = &command.external_customer_id {
            mapping.external_customer_id.clone_from(id);
        }
        if let Some(name) = &command.external_customer_name {
            mapping.external_customer_name = Some(name.clone());
        }
        if let Some(primary) = command.is_primary {
            mapping.is_primary = primary;
        }
        let updated = mapping.clone();
        self.pending_changes
            .push(CustomerChange::ExternalIdUpdated(updated.clone()));
        Ok(updated)
    }

    /// Removes an external ID mapping. No other mapping is promoted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if the mapping does not belong to this
    /// customer.
    pub fn remove_external_id(&mut self, external_id: Uuid) -> Result<(), DomainError> {
        let index = self.external_id_index(external_id)?;
        self.external_ids.remove(index);
        self.pending_changes
            .push(CustomerChange::ExternalIdRemoved { external_id });
        Ok(())
    }

    // --- helpers ---

    fn contact_index(&self, contact_id: Uuid) -> Result<usize, DomainError> {
        self.contacts
            .iter()
            .position(|c| c.id == contact_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::Contact, contact_id))
    }

    fn external_id_index(&self, external_id: Uuid) -> Result<usize, DomainError> {
        self.external_ids
            .iter()
            .position(|m| m.id == external_id)
            .ok_or_else(|| DomainError::not_found(EntityKind::ExternalId, external_id))
    }

    /// Clears the primary flag on every contact except `keep`.
    fn demote_primary_contacts(&mut self, keep: Option<Uuid>) {
        for contact in &mut self.contacts {
            if contact.is_primary && Some(contact.id) != keep {
                contact.is_primary = false;
                self.pending_changes
                    .push(CustomerChange::ContactUpdated(contact.clone()));
            }
        }
    }

    /// Flags `contact_id` primary after demoting the others. The contact must
    /// exist.
    fn promote_contact(&mut self, contact_id: Uuid) {
        self.demote_primary_contacts(Some(contact_id));
        if let Some(contact) = self.contacts.iter_mut().find(|c| c.id == contact_id) {
            if !contact.is_primary {
                contact.is_primary = true;
                self.pending_changes
                    .push(CustomerChange::ContactUpdated(contact.clone()));
            }
        }
    }

    fn demote_primary_mappings(&mut self, external_system: &str, keep: Option<Uuid>) {
        for mapping in &mut self.external_ids {
            if mapping.is_primary
                && mapping.external_system == external_system
                && Some(mapping.id) != keep
            {
                mapping.is_primary = false;
                self.pending_changes
                    .push(CustomerChange::ExternalIdUpdated(mapping.clone()));
            }
        }
    }

    fn record_customer_update(&mut self, clock: &dyn Clock) {
        self.customer.updated_at = clock.now();
        self.pending_changes
            .push(CustomerChange::CustomerUpdated(self.customer.clone()));
    }
}

impl AggregateRoot for CustomerAccount {
    type Change = CustomerChange;

    fn aggregate_id(&self) -> Uuid {
        self.customer.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn pending_changes(&self) -> &[Self::Change] {
        &self.pending_changes
    }

    fn take_pending_changes(&mut self) -> Vec<Self::Change> {
        std::mem::take(&mut self.pending_changes)
    }
}
