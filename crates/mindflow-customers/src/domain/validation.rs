//! Field-level input validation.
//!
//! Every command is validated before its handler touches the repository.

use chrono::{DateTime, Utc};
use mindflow_core::error::DomainError;

use super::commands::{
    AddContact, AddPricingTier, CreateCustomer, MapExternalId, UpdateContact, UpdateCustomer,
    UpdateExternalId, UpdatePricingTier,
};

const CUSTOMER_NAME_MAX: usize = 255;
const PRICING_TIER_MAX: usize = 100;
const CONTACT_NAME_MAX: usize = 255;
const ROLE_MAX: usize = 100;
const EMAIL_MAX: usize = 255;
const PHONE_MAX: usize = 50;
const TIER_NAME_MAX: usize = 100;
const EXTERNAL_SYSTEM_MAX: usize = 100;
const EXTERNAL_CUSTOMER_ID_MAX: usize = 255;
const EXTERNAL_CUSTOMER_NAME_MAX: usize = 255;

fn required(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    max_len(field, value, max)
}

fn max_len(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn optional_max_len(field: &str, value: Option<&str>, max: usize) -> Result<(), DomainError> {
    value.map_or(Ok(()), |v| max_len(field, v, max))
}

fn email(value: Option<&str>) -> Result<(), DomainError> {
    let Some(value) = value else {
        return Ok(());
    };
    max_len("email", value, EMAIL_MAX)?;
    let well_formed = !value.chars().any(char::is_whitespace)
        && value.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, _)| !host.is_empty())
                && !domain.ends_with('.')
        });
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "invalid email format: {value}"
        )))
    }
}

fn discount(value: f64) -> Result<(), DomainError> {
    if !value.is_finite() {
        return Err(DomainError::Validation(
            "discount percentage must be a number".into(),
        ));
    }
    if value < 0.0 {
        return Err(DomainError::Validation(
            "discount percentage cannot be negative".into(),
        ));
    }
    if value > 100.0 {
        return Err(DomainError::Validation(
            "discount percentage cannot exceed 100".into(),
        ));
    }
    Ok(())
}

/// Checks that a pricing window does not end before it starts.
///
/// # Errors
///
/// Returns `DomainError::Validation` if `expiration_date` precedes
/// `effective_date`.
pub fn date_range(
    effective_date: DateTime<Utc>,
    expiration_date: Option<DateTime<Utc>>,
) -> Result<(), DomainError> {
    match expiration_date {
        Some(expires) if expires < effective_date => Err(DomainError::Validation(
            "expiration date must not be before effective date".into(),
        )),
        _ => Ok(()),
    }
}

/// Validates a `CreateCustomer` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn create_customer(command: &CreateCustomer) -> Result<(), DomainError> {
    required("customer name", &command.customer_name, CUSTOMER_NAME_MAX)?;
    optional_max_len(
        "pricing tier",
        command.pricing_tier.as_deref(),
        PRICING_TIER_MAX,
    )
}

/// Validates an `UpdateCustomer` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn update_customer(command: &UpdateCustomer) -> Result<(), DomainError> {
    if let Some(name) = &command.customer_name {
        required("customer name", name, CUSTOMER_NAME_MAX)?;
    }
    optional_max_len(
        "pricing tier",
        command.pricing_tier.as_deref(),
        PRICING_TIER_MAX,
    )
}

/// Validates an `AddContact` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn add_contact(command: &AddContact) -> Result<(), DomainError> {
    required("contact name", &command.contact_name, CONTACT_NAME_MAX)?;
    optional_max_len("role", command.role.as_deref(), ROLE_MAX)?;
    email(command.email.as_deref())?;
    optional_max_len("phone", command.phone.as_deref(), PHONE_MAX)
}

/// Validates an `UpdateContact` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn update_contact(command: &UpdateContact) -> Result<(), DomainError> {
    if let Some(name) = &command.contact_name {
        required("contact name", name, CONTACT_NAME_MAX)?;
    }
    optional_max_len("role", command.role.as_deref(), ROLE_MAX)?;
    email(command.email.as_deref())?;
    optional_max_len("phone", command.phone.as_deref(), PHONE_MAX)
}

/// Validates an `AddPricingTier` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn add_pricing_tier(command: &AddPricingTier) -> Result<(), DomainError> {
    required("tier name", &command.tier_name, TIER_NAME_MAX)?;
    discount(command.discount_percentage)?;
    date_range(command.effective_date, command.expiration_date)
}

/// Validates the fields present on an `UpdatePricingTier` command. The
/// merged date range is checked by the aggregate.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn update_pricing_tier(command: &UpdatePricingTier) -> Result<(), DomainError> {
    if let Some(name) = &command.tier_name {
        required("tier name", name, TIER_NAME_MAX)?;
    }
    if let Some(value) = command.discount_percentage {
        discount(value)?;
    }
    if let Some(effective) = command.effective_date {
        date_range(effective, command.expiration_date)?;
    }
    Ok(())
}

/// Validates a `MapExternalId` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn map_external_id(command: &MapExternalId) -> Result<(), DomainError> {
    required("external system", &command.external_system, EXTERNAL_SYSTEM_MAX)?;
    required(
        "external customer ID",
        &command.external_customer_id,
        EXTERNAL_CUSTOMER_ID_MAX,
    )?;
    optional_max_len(
        "external customer name",
        command.external_customer_name.as_deref(),
        EXTERNAL_CUSTOMER_NAME_MAX,
    )
}

/// Validates an `UpdateExternalId` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` describing the first invalid field.
pub fn update_external_id(command: &UpdateExternalId) -> Result<(), DomainError> {
    if let Some(id) = &command.external_customer_id {
        required("external customer ID", id, EXTERNAL_CUSTOMER_ID_MAX)?;
    }
    optional_max_len(
        "external customer name",
        command.external_customer_name.as_deref(),
        EXTERNAL_CUSTOMER_NAME_MAX,
    )
}
