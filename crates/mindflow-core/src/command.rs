//! Command abstractions.

use uuid::Uuid;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted name of the command, e.g. `customers.add_contact`. Used as a
    /// tracing field.
    fn command_type(&self) -> &'static str;

    /// Correlation ID tying the command to the request that issued it.
    fn correlation_id(&self) -> Uuid;
}
