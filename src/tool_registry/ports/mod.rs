//! Port contracts for tool catalog persistence.

mod repository;

pub use repository::{RegistryStore, RegistryStoreError, RegistryStoreResult};
