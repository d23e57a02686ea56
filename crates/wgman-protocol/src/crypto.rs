//! Key issuing abstraction for wg-manager
//!
//! Client keypairs are produced through a pluggable backend so the
//! provisioning logic can run against the in-process software
//! implementation, the `wg` command line tools, or a test double.

use crate::types::{KeyError, PrivateKey, PublicKey};

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while issuing keys
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Public key derivation failed
    #[error("Public key derivation failed: {0}")]
    Derivation(String),

    /// Key error
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Backend not available
    #[error("Crypto backend not available: {0}")]
    BackendUnavailable(String),
}

/// Trait for pluggable key-issuing backends
pub trait CryptoBackend: Send + Sync {
    /// Returns the name of this backend
    fn name(&self) -> &'static str;

    /// Generate a fresh private key from a cryptographically secure source
    fn generate_private_key(&self) -> CryptoResult<PrivateKey>;

    /// Derive the public key for a private key; must be deterministic
    fn derive_public_key(&self, private_key: &PrivateKey) -> CryptoResult<PublicKey>;

    /// Issue a new keypair for a client
    fn issue_keypair(&self) -> CryptoResult<(PrivateKey, PublicKey)> {
        let private_key = self.generate_private_key()?;
        let public_key = self.derive_public_key(&private_key)?;
        tracing::debug!(backend = self.name(), key = %public_key.fingerprint(), "Issued keypair");
        Ok((private_key, public_key))
    }
}

/// Selects the default in-process crypto backend
pub fn select_backend() -> Box<dyn CryptoBackend> {
    #[cfg(feature = "software-backend")]
    {
        Box::new(super::software::SoftwareBackend::new())
    }

    #[cfg(not(feature = "software-backend"))]
    {
        compile_error!("At least one crypto backend must be enabled");
    }
}
