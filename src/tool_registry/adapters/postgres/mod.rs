//! `PostgreSQL` adapters for tool catalog persistence.

mod models;
mod repository;
mod schema;

#[cfg(test)]
mod tests;

pub use repository::{PostgresRegistryStore, RegistryPgPool};
