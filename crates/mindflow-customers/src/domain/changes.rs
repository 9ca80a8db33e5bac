//! Row changes recorded by the customer aggregate.
//!
//! A command produces an ordered list of changes. Repositories apply the list
//! in order inside one transaction, so the order matters: demotions of the
//! previous primary always precede the promotion of the new one.

use uuid::Uuid;

use super::entities::{Contact, Customer, ExternalIdMapping, PricingTier};

/// Change type name for `CustomerChange::CustomerCreated`.
pub const CUSTOMER_CREATED: &str = "customers.customer_created";
/// Change type name for `CustomerChange::CustomerUpdated`.
pub const CUSTOMER_UPDATED: &str = "customers.customer_updated";
/// Change type name for `CustomerChange::CustomerDeleted`.
pub const CUSTOMER_DELETED: &str = "customers.customer_deleted";
/// Change type name for `CustomerChange::ContactAdded`.
pub const CONTACT_ADDED: &str = "customers.contact_added";
/// Change type name for `CustomerChange::ContactUpdated`.
pub const CONTACT_UPDATED: &str = "customers.contact_updated";
/// Change type name for `CustomerChange::ContactRemoved`.
pub const CONTACT_REMOVED: &str = "customers.contact_removed";
/// Change type name for `CustomerChange::PricingTierAdded`.
pub const PRICING_TIER_ADDED: &str = "customers.pricing_tier_added";
/// Change type name for `CustomerChange::PricingTierUpdated`.
pub const PRICING_TIER_UPDATED: &str = "customers.pricing_tier_updated";
/// Change type name for `CustomerChange::PricingTierRemoved`.
pub const PRICING_TIER_REMOVED: &str = "customers.pricing_tier_removed";
/// Change type name for `CustomerChange::ExternalIdMapped`.
pub const EXTERNAL_ID_MAPPED: &str = "customers.external_id_mapped";
/// Change type name for `CustomerChange::ExternalIdUpdated`.
pub const EXTERNAL_ID_UPDATED: &str = "customers.external_id_updated";
/// Change type name for `CustomerChange::ExternalIdRemoved`.
pub const EXTERNAL_ID_REMOVED: &str = "customers.external_id_removed";

/// A single row-level write against the customer aggregate. Update variants
/// carry the full new row.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerChange {
    /// Insert the customer row.
    CustomerCreated(Customer),
    /// Overwrite the customer row.
    CustomerUpdated(Customer),
    /// Delete the customer and every child row.
    CustomerDeleted {
        /// The customer being removed.
        customer_id: Uuid,
    },
    /// Insert a contact.
    ContactAdded(Contact),
    /// Overwrite a contact.
    ContactUpdated(Contact),
    /// Delete a contact.
    ContactRemoved {
        /// The contact being removed.
        contact_id: Uuid,
    },
    /// Insert a pricing tier.
    PricingTierAdded(PricingTier),
    /// Overwrite a pricing tier.
    PricingTierUpdated(PricingTier),
    /// Delete a pricing tier.
    PricingTierRemoved {
        /// The tier being removed.
        tier_id: Uuid,
    },
    /// Insert an external ID mapping.
    ExternalIdMapped(ExternalIdMapping),
    /// Overwrite an external ID mapping.
    ExternalIdUpdated(ExternalIdMapping),
    /// Delete an external ID mapping.
    ExternalIdRemoved {
        /// The mapping being removed.
        external_id: Uuid,
    },
}

impl CustomerChange {
    /// Returns the change type name, used for logging.
    #[must_use]
    pub fn change_type(&self) -> &'static str {
        match self {
            Self::CustomerCreated(_) => CUSTOMER_CREATED,
            Self::CustomerUpdated(_) => CUSTOMER_UPDATED,
            Self::CustomerDeleted { .. } => CUSTOMER_DELETED,
            Self::ContactAdded(_) => CONTACT_ADDED,
            Self::ContactUpdated(_) => CONTACT_UPDATED,
            Self::ContactRemoved { .. } => CONTACT_REMOVED,
            Self::PricingTierAdded(_) => PRICING_TIER_ADDED,
            Self::PricingTierUpdated(_) => PRICING_TIER_UPDATED,
            Self::PricingTierRemoved { .. } => PRICING_TIER_REMOVED,
            Self::ExternalIdMapped(_) => EXTERNAL_ID_MAPPED,
            Self::ExternalIdUpdated(_) => EXTERNAL_ID_UPDATED,
            Self::ExternalIdRemoved { .. } => EXTERNAL_ID_REMOVED,
        }
    }
}
