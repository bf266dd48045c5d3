//! Reactive SDN controller application.
//!
//! This crate implements the `nibd` daemon: a network information base (NIB)
//! fed by controller events, two handlers that derive forwarding behavior
//! from it, and a compiler that keeps the installed policy in step with the
//! NIB.
//!
//! # Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`nib`] | Port registry, MAC location table, load-balancer services, dirty flag |
//! | [`learning`] | MAC learning, unicast/flood packet-outs, punt policy |
//! | [`load_balancer`] | Client→backend pinning and rewrite rules |
//! | [`compiler`] | Policy union, synchronous and deferred installs |
//! | [`app`] | Event dispatch and the run loop |
//! | [`replay`] | JSON-lines transport used by the binary |
//!
//! # Event flow
//!
//! | Event | NIB | Install |
//! |-------|-----|---------|
//! | `connected` | topology snapshot | immediate |
//! | `packet_in` | learn source, pin LB clients | deferred, if dirty |
//! | `port_up` / `port_down` | unlearn hosts on the port, add/remove it | immediate |
//! | `backend_health` | backend health flag | deferred, if changed |
//!
//! # Example
//!
//! ```ignore
//! use nibd::{App, NibdConfig, LoadBalancerConfig};
//!
//! let mut app = App::from_config(&config, &services, controller)?;
//! app.connected().await?;
//! app.run(events).await?;
//! ```

pub mod app;
pub mod compiler;
pub mod config;
pub mod error;
pub mod handler;
pub mod learning;
pub mod load_balancer;
pub mod nib;
pub mod packet;
pub mod replay;

pub use app::{App, Event};
pub use compiler::{CompilerStats, PendingInstall, PolicyCompiler, PolicyState};
pub use config::{ConfigError, NibdConfig};
pub use error::{NibdError, Result};
pub use handler::{Handler, PacketIn};
pub use learning::{ForwardDecision, LearningHandler, LearningStats};
pub use load_balancer::{LoadBalancerConfig, LoadBalancerHandler};
pub use nib::{Nib, NibError};
pub use packet::{EthernetFrame, PacketError};
pub use replay::ReplayController;
