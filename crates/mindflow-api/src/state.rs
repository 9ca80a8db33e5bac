//! Shared application state.

use std::fmt;
use std::sync::Arc;

use mindflow_core::clock::Clock;
use mindflow_customers::domain::repository::CustomerRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for record timestamps and pricing-tier resolution.
    pub clock: Arc<dyn Clock>,
    /// Customer aggregate storage.
    pub customers: Arc<dyn CustomerRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, customers: Arc<dyn CustomerRepository>) -> Self {
        Self { clock, customers }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
