pub mod adapters;
pub mod application;
pub mod domain;
pub mod infra;

// In-memory repos and builders shared by unit and integration tests.
pub mod test_utils;

// Re-exports for shorter use statements.
pub use application::*;
pub use domain::*;
