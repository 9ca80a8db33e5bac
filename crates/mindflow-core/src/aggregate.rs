//! Aggregate root abstraction.

use uuid::Uuid;

/// An aggregate root that records the row changes produced by its commands.
///
/// A handler loads the aggregate at a known `version`, invokes domain
/// methods, then hands `pending_changes` to the repository together with that
/// version. The repository applies the whole list atomically or not at all.
pub trait AggregateRoot: Send + Sync {
    /// The change type this aggregate records.
    type Change: Send + Sync + std::fmt::Debug;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the version the aggregate was loaded at (0 when new).
    fn version(&self) -> i64;

    /// Returns changes recorded since the aggregate was loaded.
    fn pending_changes(&self) -> &[Self::Change];

    /// Drains the recorded changes, leaving the list empty.
    fn take_pending_changes(&mut self) -> Vec<Self::Change>;
}
