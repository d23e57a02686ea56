//! Key material and client identity types for wg-manager

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size constants for X25519 (WireGuard static keys)
pub mod x25519 {
    /// Public key size in bytes
    pub const PUBLIC_KEY_SIZE: usize = 32;
    /// Secret key size in bytes
    pub const SECRET_KEY_SIZE: usize = 32;
    /// Length of a key in standard base64 (with padding)
    pub const ENCODED_LEN: usize = 44;
}

// ============================================================================
// Keys
// ============================================================================

/// WireGuard private key (zeroized on drop)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub [u8; 32]);

impl PrivateKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(key_array(bytes)?))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        base64::encode(self.0)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        let bytes = base64::decode(s.trim()).map_err(|_| KeyError::InvalidEncoding)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// WireGuard public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(key_array(bytes)?))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as base64
    pub fn to_base64(&self) -> String {
        base64::encode(self.0)
    }

    /// Decode from base64
    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        let bytes = base64::decode(s.trim()).map_err(|_| KeyError::InvalidEncoding)?;
        Self::from_bytes(&bytes)
    }

    /// Short hex fingerprint for log lines
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base64(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

fn key_array(bytes: &[u8]) -> Result<[u8; 32], KeyError> {
    if bytes.len() != x25519::SECRET_KEY_SIZE {
        return Err(KeyError::InvalidLength {
            expected: x25519::SECRET_KEY_SIZE,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

// ============================================================================
// Client names
// ============================================================================

/// Validated client name: the config-record key and the external handle
/// for list/remove/export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClientName(String);

impl ClientName {
    /// Minimum name length
    pub const MIN_LEN: usize = 3;
    /// Maximum name length
    pub const MAX_LEN: usize = 20;
    /// Names that collide with system files or the gateway itself
    pub const RESERVED: &'static [&'static str] =
        &["server", "wg0", "admin", "root", "default", "config"];

    /// Validate and wrap a client name
    pub fn parse(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        let len = name.chars().count();
        if len < Self::MIN_LEN {
            return Err(NameError::TooShort { min: Self::MIN_LEN });
        }
        if len > Self::MAX_LEN {
            return Err(NameError::TooLong { max: Self::MAX_LEN });
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(NameError::InvalidChar(c));
        }
        if Self::RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            return Err(NameError::Reserved(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Key-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Invalid encoding
    #[error("Invalid key encoding")]
    InvalidEncoding,
}

/// Client name validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Missing name
    #[error("client name must not be empty")]
    Empty,

    /// Below the minimum length
    #[error("client name is too short (minimum {min} characters)")]
    TooShort {
        /// Minimum length
        min: usize,
    },

    /// Above the maximum length
    #[error("client name is too long (maximum {max} characters)")]
    TooLong {
        /// Maximum length
        max: usize,
    },

    /// Character outside `[A-Za-z0-9_-]`
    #[error("client name contains {0:?}; only latin letters, digits, '-' and '_' are allowed")]
    InvalidChar(char),

    /// Reserved by the system
    #[error("client name '{0}' is reserved")]
    Reserved(String),
}
