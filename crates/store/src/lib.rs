//! Read-only access to customers and orders. The engine never writes back
//! through this layer; computed scores, segments and alerts stay derived.

pub mod memory;
pub mod repository;

pub use memory::InMemoryRepository;
pub use repository::{CustomerFilter, CustomerRepository, RepositoryError};
