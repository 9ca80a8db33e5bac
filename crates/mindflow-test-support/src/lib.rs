//! Shared test doubles for MindFlow.

mod clock;
mod repository;

pub use clock::FixedClock;
pub use repository::{FailingCustomerRepository, InMemoryCustomerRepository};
