//! wg-manager protocol layer
//!
//! Key material, client identities, the key-issuing backend abstraction,
//! the tool's own configuration, and the WireGuard configuration text
//! format shared by client records and the gateway's boot-time file.
//!
//! # Example
//!
//! ```
//! use wgman_protocol::{select_backend, CryptoBackend};
//!
//! let backend = select_backend();
//! let (private_key, public_key) = backend.issue_keypair().unwrap();
//! assert_eq!(backend.derive_public_key(&private_key).unwrap(), public_key);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
#[cfg(feature = "software-backend")]
pub mod software;
pub mod types;
pub mod wgconf;

// Re-exports
pub use config::{Config, ConfigError, Subnet, DEFAULT_CONFIG_PATH};
pub use crypto::{select_backend, CryptoBackend, CryptoError, CryptoResult};
#[cfg(feature = "software-backend")]
pub use software::SoftwareBackend;
pub use types::{ClientName, KeyError, NameError, PrivateKey, PublicKey};
pub use wgconf::{parse_host_address, ClientConfig, ConfError, Section, SectionKind, WgConfig};

/// Default WireGuard UDP port
pub const DEFAULT_PORT: u16 = 51820;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_backend() {
        let backend = select_backend();
        assert_eq!(backend.name(), "software (x25519-dalek)");
    }
}
