//! Unit tests for the tool catalog.

mod service_tests;
