//! Current pricing-tier resolution.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::entities::PricingTier;

/// Returns the tier in force at `now`.
///
/// Among tiers whose window contains `now`, the one with the latest
/// `effective_date` wins. Equal effective dates fall back to the most recently
/// created tier, then to the largest id, so the answer never depends on input
/// order.
#[must_use]
pub fn current_tier(tiers: &[PricingTier], now: DateTime<Utc>) -> Option<&PricingTier> {
    tiers
        .iter()
        .filter(|tier| tier.is_effective_at(now))
        .max_by(|a, b| precedence(a, b))
}

/// Orders tiers newest-first: effective date, then creation time, then id.
pub(crate) fn precedence(a: &PricingTier, b: &PricingTier) -> Ordering {
    a.effective_date
        .cmp(&b.effective_date)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}
