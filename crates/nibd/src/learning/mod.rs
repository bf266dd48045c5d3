//! Reactive L2 learning switch.
//!
//! Every packet is punted to the controller, which learns the source MAC's
//! location and forwards the packet itself: unicast when the destination is
//! known on the same switch, flood otherwise. No per-host flow rules are
//! installed.
//!
//! # Known limitation
//!
//! A source MAC is learned only the first time it is seen. Later packets
//! from the same MAC on a different port do not refresh its location, so a
//! host that moves keeps receiving traffic at its old port until that port
//! goes down or comes back up.

mod handler;
mod types;

pub use handler::LearningHandler;
pub use types::{ForwardDecision, LearningStats};
