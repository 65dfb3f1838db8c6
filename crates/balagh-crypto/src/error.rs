use thiserror::Error;

/// Errors raised by the encrypted channel.
///
/// `Authentication` is the only outcome of a failed decryption;
/// callers cannot tell a bad tag from a bad nonce or a wrong key.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed")]
    Authentication,

    #[error("encryption failed")]
    Encryption,

    #[error("peer public key rejected")]
    KeyExchange,

    #[error("malformed envelope: {0}")]
    Format(&'static str),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}
