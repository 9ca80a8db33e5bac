//! MindFlow Core: shared domain abstractions.
//!
//! Traits and types every bounded context depends on: time, commands,
//! aggregates, errors and pagination. This crate contains no infrastructure
//! code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod pagination;
