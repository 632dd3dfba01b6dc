//! Unit tests for the connection pool.
