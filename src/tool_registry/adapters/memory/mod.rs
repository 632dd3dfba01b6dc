//! In-memory adapters for the tool catalog.

mod repository;

pub use repository::InMemoryRegistryStore;
