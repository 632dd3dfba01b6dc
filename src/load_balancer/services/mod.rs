//! Balancer service.

mod balancer;

pub use balancer::{LoadBalancer, LoadBalancerError, LoadBalancerResult};
