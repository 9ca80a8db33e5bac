//! Domain error types.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The kind of record a `DomainError::NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A customer.
    Customer,
    /// A customer contact.
    Contact,
    /// A customer pricing tier.
    PricingTier,
    /// An external-system ID mapping.
    ExternalId,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Customer => "customer",
            Self::Contact => "customer contact",
            Self::PricingTier => "customer pricing tier",
            Self::ExternalId => "customer external ID",
        };
        f.write_str(name)
    }
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of record was looked up.
        entity: EntityKind,
        /// The identifier used for the lookup.
        id: String,
    },

    /// Hard delete refused because jobs still reference the customer.
    #[error("cannot delete customer {customer_id}: has dependencies: {job_count} job(s)")]
    HasDependencies {
        /// The customer that was to be deleted.
        customer_id: Uuid,
        /// Number of jobs referencing it.
        job_count: i64,
    },

    /// A mapping for the customer and external system already exists.
    #[error("external ID already exists for system {external_system}: {external_customer_id}")]
    Duplicate {
        /// The external system tag.
        external_system: String,
        /// The external identifier that was rejected.
        external_customer_id: String,
    },

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on customer {customer_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The customer whose aggregate changed underneath the command.
        customer_id: Uuid,
        /// The version the command was based on.
        expected: i64,
        /// The version found in storage.
        actual: i64,
    },

    /// Malformed input, rejected before anything is written.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for a `NotFound` keyed by a UUID.
    #[must_use]
    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_entity_and_id() {
        let id = Uuid::nil();

        let err = DomainError::not_found(EntityKind::Contact, id);

        assert_eq!(
            err.to_string(),
            "customer contact not found: 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_has_dependencies_message_includes_job_count() {
        let err = DomainError::HasDependencies {
            customer_id: Uuid::nil(),
            job_count: 3,
        };

        assert!(err.to_string().ends_with("3 job(s)"));
    }
}
