//! Route modules for the customers API.

pub mod contacts;
pub mod customers;
pub mod external_ids;
pub mod health;
pub mod pricing_tiers;
