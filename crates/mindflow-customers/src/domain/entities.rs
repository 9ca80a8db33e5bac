//! Records owned by the customer aggregate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mindflow_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a builder customer buys homes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    /// Production builder with a fixed plan catalogue.
    Production,
    /// Production plans with customer-selected options.
    SemiCustom,
    /// Fully custom homes.
    FullCustom,
}

impl CustomerType {
    /// The storage and wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "PRODUCTION",
            Self::SemiCustom => "SEMI_CUSTOM",
            Self::FullCustom => "FULL_CUSTOM",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRODUCTION" => Ok(Self::Production),
            "SEMI_CUSTOM" => Ok(Self::SemiCustom),
            "FULL_CUSTOM" => Ok(Self::FullCustom),
            other => Err(DomainError::Validation(format!(
                "unknown customer type: {other}"
            ))),
        }
    }
}

/// A customer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Customer identifier.
    pub id: Uuid,
    /// Display name.
    pub customer_name: String,
    /// Builder type.
    pub customer_type: CustomerType,
    /// Free-text pricing tier label.
    pub pricing_tier: Option<String>,
    /// The contact currently flagged primary, if any.
    pub primary_contact_id: Option<Uuid>,
    /// `false` once soft-deleted.
    pub is_active: bool,
    /// Free-text notes.
    pub notes: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

/// A person to contact at a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Full name.
    pub contact_name: String,
    /// Job role at the customer.
    pub role: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether the contact is sent notifications.
    pub receives_notifications: bool,
    /// Whether this is the customer's primary contact.
    pub is_primary: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// A discount that applies to a customer over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    /// Tier identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Tier label.
    pub tier_name: String,
    /// Discount in percent, `0.0..=100.0`.
    pub discount_percentage: f64,
    /// First instant the tier applies.
    pub effective_date: DateTime<Utc>,
    /// Last instant the tier applies; open-ended when `None`.
    pub expiration_date: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl PricingTier {
    /// Whether the tier's validity window contains `at`. Both bounds are
    /// inclusive.
    #[must_use]
    pub fn is_effective_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_date <= at && self.expiration_date.is_none_or(|expires| expires >= at)
    }
}

/// Links a customer to its record in a third-party system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdMapping {
    /// Mapping identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// External system tag, e.g. `SALES_1440`.
    pub external_system: String,
    /// The customer's identifier in that system.
    pub external_customer_id: String,
    /// The customer's display name in that system.
    pub external_customer_name: Option<String>,
    /// Preferred mapping for the system.
    pub is_primary: bool,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// A customer with all child records, as loaded from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSnapshot {
    /// The customer row.
    pub customer: Customer,
    /// All contacts, in no particular order.
    pub contacts: Vec<Contact>,
    /// All pricing tiers, in no particular order.
    pub pricing_tiers: Vec<PricingTier>,
    /// All external ID mappings, in no particular order.
    pub external_ids: Vec<ExternalIdMapping>,
    /// Aggregate version, bumped on every applied change batch.
    pub version: i64,
}
