//! Application services for the Customers context.

pub mod command_handlers;
pub mod query_handlers;
