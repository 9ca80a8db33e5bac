//! MindFlow Customers bounded context.
//!
//! Responsible for customer records and the consistency rules of their
//! contacts, pricing tiers and external-system ID mappings.

pub mod application;
pub mod domain;
