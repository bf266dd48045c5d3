//! Transport failure type.
//!
//! Failures are never retried by the application; they propagate to the
//! caller of the event handler that triggered them.

use nib_types::SwitchId;
use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors reported by a [`crate::Controller`] implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// A packet-out instruction was rejected.
    #[error("Packet-out to switch {switch} failed: {message}")]
    PacketOut { switch: SwitchId, message: String },

    /// A policy install was rejected.
    #[error("Policy install failed: {message}")]
    Install { message: String },
}

impl TransportError {
    pub fn packet_out(switch: SwitchId, message: impl Into<String>) -> Self {
        Self::PacketOut {
            switch,
            message: message.into(),
        }
    }

    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
        }
    }
}
