//! Domain model for the Customers context.

pub mod aggregates;
pub mod changes;
pub mod commands;
pub mod entities;
pub mod pricing;
pub mod repository;
pub mod validation;
