//! Selection among several instances backing one logical tool.
//!
//! Health flags change only through [`services::LoadBalancer::set_health`]
//! or an out-of-band [`ports::InstanceProber`] pass; recording a failed
//! response does not mark an instance unhealthy.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
