use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::info;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::CryptoError;

/// Length of X25519 public and private keys.
pub const KEY_LEN: usize = 32;

/// The server's long-term X25519 keypair.
///
/// Created once at startup and shared read-only for the life of the process.
/// The private half never leaves this type except through
/// [`ServerKeyPair::export_secret_base64`].
pub struct ServerKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public", &self.public_key_base64())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ServerKeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_secret_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Load the keypair from base64 configuration values, or generate one
    /// when neither value is configured.
    ///
    /// Any configured value that is malformed is an error: the server must
    /// not start with a key it did not intend to use.
    pub fn initialize(
        public_b64: Option<&str>,
        secret_b64: Option<&str>,
    ) -> Result<Self, CryptoError> {
        let public_b64 = public_b64.map(str::trim).filter(|s| !s.is_empty());
        let secret_b64 = secret_b64.map(str::trim).filter(|s| !s.is_empty());

        let keypair = match (public_b64, secret_b64) {
            (None, None) => {
                let keypair = Self::generate();
                info!(
                    "Generated new server keypair (fingerprint {})",
                    keypair.fingerprint()
                );
                return Ok(keypair);
            }
            (Some(_), None) => {
                return Err(CryptoError::InvalidKey(
                    "public key configured without a private key".into(),
                ));
            }
            (public, Some(secret)) => {
                let keypair = Self::from_secret_bytes(key_from_base64(secret)?);
                if let Some(public) = public {
                    if key_from_base64(public)? != keypair.public_key_bytes() {
                        return Err(CryptoError::InvalidKey(
                            "configured public key does not match private key".into(),
                        ));
                    }
                }
                keypair
            }
        };

        info!(
            "Loaded server keypair from configuration (fingerprint {})",
            keypair.fingerprint()
        );
        Ok(keypair)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_key_bytes(&self) -> [u8; KEY_LEN] {
        self.public.to_bytes()
    }

    pub fn public_key_base64(&self) -> String {
        key_to_base64(self.public.as_bytes())
    }

    /// Short SHA-256 fingerprint of the public key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.public.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Base64 private key, for operators persisting a generated key.
    pub fn export_secret_base64(&self) -> String {
        BASE64.encode(self.secret.as_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

/// Encode a key to base64 for the wire or configuration.
pub fn key_to_base64(key: &[u8; KEY_LEN]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key.
pub fn key_from_base64(encoded: &str) -> Result<[u8; KEY_LEN], CryptoError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidKey("key is not valid base64".into()))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("invalid key length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_when_unconfigured() {
        let a = ServerKeyPair::initialize(None, None).unwrap();
        let b = ServerKeyPair::initialize(Some(""), Some("  ")).unwrap();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn loads_configured_keypair() {
        let original = ServerKeyPair::generate();
        let secret = original.export_secret_base64();
        let public = original.public_key_base64();

        let loaded = ServerKeyPair::initialize(Some(&public), Some(&secret)).unwrap();
        assert_eq!(loaded.public_key_bytes(), original.public_key_bytes());

        let secret_only = ServerKeyPair::initialize(None, Some(&secret)).unwrap();
        assert_eq!(secret_only.public_key_bytes(), original.public_key_bytes());
    }

    #[test]
    fn rejects_malformed_configuration() {
        let other = ServerKeyPair::generate();
        let keypair = ServerKeyPair::generate();

        assert!(ServerKeyPair::initialize(None, Some("not base64!")).is_err());
        assert!(ServerKeyPair::initialize(None, Some(&BASE64.encode([1u8; 16]))).is_err());
        assert!(ServerKeyPair::initialize(Some(&keypair.public_key_base64()), None).is_err());
        assert!(
            ServerKeyPair::initialize(
                Some(&other.public_key_base64()),
                Some(&keypair.export_secret_base64())
            )
            .is_err()
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let keypair = ServerKeyPair::generate();
        let printed = format!("{:?}", keypair);
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains(&keypair.export_secret_base64()));
    }

    #[test]
    fn base64_roundtrip() {
        let key = [7u8; KEY_LEN];
        assert_eq!(key_from_base64(&key_to_base64(&key)).unwrap(), key);
    }
}
