//! Virtual-address load balancer.
//!
//! Clients address a service by its virtual IP. The first IPv4 packet from a
//! client to that address pins the client to a live backend (round robin);
//! the compiled policy then rewrites the client's traffic to the backend and
//! the backend's replies back to the virtual address.
//!
//! Service endpoints live in the NIB; this module holds the JSON service
//! definitions and the handler that drives assignment and rule generation.

mod config;
mod handler;

pub use config::{BackendConfig, LoadBalancerConfig, ServiceConfig};
pub use handler::{LoadBalancerHandler, REWRITE_PRIORITY};
