//! Unit tests for breakers and executor layers.
