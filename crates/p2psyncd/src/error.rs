//! Error types for p2psyncd

use thiserror::Error;

/// P2P group synchronization daemon errors
#[derive(Error, Debug)]
pub enum P2pSyncError {
    /// Netlink socket or message error
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// Interface index could not be resolved to a name
    #[error("Interface not found: index {0}")]
    InterfaceNotFound(u32),

    /// Redis connection or operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Control interface name cannot be turned into a group name pattern
    #[error("Invalid control interface '{name}': {reason}")]
    InvalidControlInterface { name: String, reason: String },

    /// Malformed configuration section path
    #[error("Invalid section path: {0}")]
    InvalidSectionPath(String),

    /// Configuration store rejected an operation
    #[error("Store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for p2psyncd operations
pub type Result<T> = std::result::Result<T, P2pSyncError>;
