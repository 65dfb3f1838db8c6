//! Balagh Crypto Library
//!
//! Per-request encrypted channel between a client and the server:
//! - X25519 exchange between the server's static key and a client ephemeral key
//! - BLAKE2b-512 split into one key per direction (libsodium `crypto_kx` layout)
//! - XChaCha20-Poly1305 with random 24-byte nonces, no associated data

pub mod channel;
pub mod encrypt;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod session;

pub use error::CryptoError;
