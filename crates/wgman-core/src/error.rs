//! Client manager error types

use std::io;
use thiserror::Error;
use wgman_protocol::{ConfError, ConfigError, CryptoError, KeyError, NameError};

/// Result type for client manager operations
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while managing clients
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Malformed or missing client name
    #[error("Invalid client name: {0}")]
    InvalidName(#[from] NameError),

    /// `add` on a name that already has a record
    #[error("Client '{0}' already exists")]
    AlreadyExists(String),

    /// `remove`/`export` on a name without a record
    #[error("Client '{0}' not found")]
    NotFound(String),

    /// Every host address in the subnet is assigned
    #[error("No free addresses: all {pool} addresses in {subnet} are assigned")]
    PoolExhausted {
        /// Managed subnet
        subnet: String,
        /// Pool size
        pool: usize,
    },

    /// Configured client cap reached
    #[error("Client limit reached ({max}); remove unused clients first")]
    ClientLimit {
        /// Configured maximum
        max: usize,
    },

    /// External WireGuard tool failed
    #[error("{command} failed: {detail}")]
    Command {
        /// Command line that failed
        command: String,
        /// stderr or spawn error
        detail: String,
    },

    /// Key issuing failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Bad key material
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A stored client record could not be parsed
    #[error("Invalid client record '{name}': {source}")]
    InvalidRecord {
        /// Client name
        name: String,
        /// Parse failure
        #[source]
        source: ConfError,
    },

    /// Writer lock could not be taken
    #[error("Failed to acquire lock {path}: {detail}")]
    Lock {
        /// Lock file
        path: String,
        /// Reason
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Error taxonomy used for reporting and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input, rejected before any external call
    Validation,
    /// Name already present or absent
    Conflict,
    /// No room for another client
    Capacity,
    /// External primitive, filesystem or configuration fault
    External,
}

impl ManagerError {
    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            ManagerError::InvalidName(_) => ErrorCategory::Validation,
            ManagerError::AlreadyExists(_) | ManagerError::NotFound(_) => ErrorCategory::Conflict,
            ManagerError::PoolExhausted { .. } | ManagerError::ClientLimit { .. } => {
                ErrorCategory::Capacity
            }
            _ => ErrorCategory::External,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Conflict | ErrorCategory::Capacity => 1,
            ErrorCategory::External => 2,
        }
    }
}
