//! PostgreSQL-backed storage for MindFlow.

mod error;
pub mod pg_customer_repository;

pub use pg_customer_repository::PgCustomerRepository;
