//! Commands for the Customers context.

use chrono::{DateTime, Utc};
use mindflow_core::command::Command;
use uuid::Uuid;

use super::entities::CustomerType;

macro_rules! impl_command {
    ($ty:ident, $name:literal) => {
        impl Command for $ty {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
}

/// Command to create a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub customer_name: String,
    /// Builder type.
    pub customer_type: CustomerType,
    /// Free-text pricing tier label.
    pub pricing_tier: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl_command!(CreateCustomer, "customers.create_customer");

/// Command to patch a customer. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer to update.
    pub customer_id: Uuid,
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

impl_command!(UpdateCustomer, "customers.update_customer");

/// How a customer is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Mark inactive, keep the record and its children.
    #[default]
    Soft,
    /// Remove the record and all children.
    Hard,
}

/// Command to delete a customer.
#[derive(Debug, Clone)]
pub struct DeleteCustomer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer to delete.
    pub customer_id: Uuid,
    /// Soft or hard delete.
    pub mode: DeleteMode,
}

impl_command!(DeleteCustomer, "customers.delete_customer");

/// Command to add a contact to a customer.
#[derive(Debug, Clone)]
pub struct AddContact {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// Full name.
    pub contact_name: String,
    /// Job role.
    pub role: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether the contact is sent notifications.
    pub receives_notifications: bool,
    /// Requested primary flag. Ignored (forced on) for a first contact.
    pub is_primary: bool,
}

impl_command!(AddContact, "customers.add_contact");

/// Command to patch a contact. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateContact {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The contact to update.
    pub contact_id: Uuid,
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

impl_command!(UpdateContact, "customers.update_contact");

/// Command to remove a contact.
#[derive(Debug, Clone)]
pub struct RemoveContact {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The contact to remove.
    pub contact_id: Uuid,
}

impl_command!(RemoveContact, "customers.remove_contact");

/// Command to add a pricing tier.
#[derive(Debug, Clone)]
pub struct AddPricingTier {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// Tier label.
    pub tier_name: String,
    /// Discount in percent.
    pub discount_percentage: f64,
    /// First instant the tier applies.
    pub effective_date: DateTime<Utc>,
    /// Last instant the tier applies.
    pub expiration_date: Option<DateTime<Utc>>,
}

impl_command!(AddPricingTier, "customers.add_pricing_tier");

/// Command to patch a pricing tier. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePricingTier {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The tier to update.
    pub tier_id: Uuid,
    /// New label.
    pub tier_name: Option<String>,
    /// New discount.
    pub discount_percentage: Option<f64>,
    /// New start.
    pub effective_date: Option<DateTime<Utc>>,
    /// New end.
    pub expiration_date: Option<DateTime<Utc>>,
}

impl_command!(UpdatePricingTier, "customers.update_pricing_tier");

/// Command to remove a pricing tier.
#[derive(Debug, Clone)]
pub struct RemovePricingTier {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The tier to remove.
    pub tier_id: Uuid,
}

impl_command!(RemovePricingTier, "customers.remove_pricing_tier");

/// Command to map a customer to an external system record.
#[derive(Debug, Clone)]
pub struct MapExternalId {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// External system tag.
    pub external_system: String,
    /// The customer's identifier in that system.
    pub external_customer_id: String,
    /// The customer's display name in that system.
    pub external_customer_name: Option<String>,
    /// Preferred mapping for the system.
    pub is_primary: bool,
}

impl_command!(MapExternalId, "customers.map_external_id");

/// Command to patch an external ID mapping. The system tag is immutable.
#[derive(Debug, Clone, Default)]
pub struct UpdateExternalId {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The mapping to update.
    pub external_id: Uuid,
    /// New external identifier.
    pub external_customer_id: Option<String>,
    /// New external display name.
    pub external_customer_name: Option<String>,
    /// New primary flag.
    pub is_primary: Option<bool>,
}

impl_command!(UpdateExternalId, "customers.update_external_id");

/// Command to remove an external ID mapping.
#[derive(Debug, Clone)]
pub struct RemoveExternalId {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning customer.
    pub customer_id: Uuid,
    /// The mapping to remove.
    pub external_id: Uuid,
}

impl_command!(RemoveExternalId, "customers.remove_external_id");
