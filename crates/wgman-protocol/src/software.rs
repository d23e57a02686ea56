//! Software key backend using x25519-dalek

use crate::crypto::{CryptoBackend, CryptoResult};
use crate::types::{PrivateKey, PublicKey};

use rand_core::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519Secret};

/// Software key backend
#[derive(Debug, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    /// Create a new software backend
    pub fn new() -> Self {
        Self
    }
}

impl CryptoBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software (x25519-dalek)"
    }

    fn generate_private_key(&self) -> CryptoResult<PrivateKey> {
        let secret = X25519Secret::random_from_rng(OsRng);
        Ok(PrivateKey(secret.to_bytes()))
    }

    fn derive_public_key(&self, private_key: &PrivateKey) -> CryptoResult<PublicKey> {
        let secret = X25519Secret::from(*private_key.as_bytes());
        let public = X25519PublicKey::from(&secret);
        Ok(PublicKey(*public.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SoftwareBackend {
        SoftwareBackend::new()
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let b = backend();
        let (sk, pk) = b.issue_keypair().expect("keygen failed");

        assert_eq!(b.derive_public_key(&sk).unwrap(), pk);
        assert_eq!(b.derive_public_key(&sk).unwrap(), pk);
    }

    #[test]
    fn test_keypairs_are_fresh() {
        let b = backend();
        let (sk_a, pk_a) = b.issue_keypair().unwrap();
        let (sk_b, pk_b) = b.issue_keypair().unwrap();

        assert_ne!(sk_a, sk_b);
        assert_ne!(pk_a, pk_b);
    }

    #[test]
    fn test_known_vector() {
        // RFC 7748 section 6.1, Alice's key pair
        let sk = PrivateKey::from_bytes(
            &hex::decode("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
                .unwrap(),
        )
        .unwrap();
        let pk = backend().derive_public_key(&sk).unwrap();
        assert_eq!(
            hex::encode(pk.as_bytes()),
            "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaadb4e6a"
        );
    }
}
