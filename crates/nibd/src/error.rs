//! Error types for nibd

use nib_policy::TransportError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::nib::NibError;

/// Controller application errors
#[derive(Error, Debug)]
pub enum NibdError {
    /// Packet-out or policy install failed; fatal to the event loop
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// An event named an unknown service or backend
    #[error("NIB error: {0}")]
    Nib(#[from] NibError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed replay input
    #[error("Bad event on line {line}: {message}")]
    Event { line: usize, message: String },
}

/// Result type for nibd operations
pub type Result<T> = std::result::Result<T, NibdError>;
