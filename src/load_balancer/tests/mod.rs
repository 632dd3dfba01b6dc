//! Unit tests for the load balancer.
