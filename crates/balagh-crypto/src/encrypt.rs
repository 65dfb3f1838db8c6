use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};

use crate::error::CryptoError;
use crate::keys::KEY_LEN;

/// XChaCha20 nonce length.
pub const NONCE_LEN: usize = 24;

/// Draw a fresh random nonce. 192 bits makes random collisions negligible.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&XChaCha20Poly1305::generate_nonce(&mut OsRng));
    nonce
}

/// Encrypt with XChaCha20-Poly1305 and no associated data.
/// The nonce must never be reused with the same key; prefer [`seal`].
pub fn encrypt(
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
    key: &[u8; KEY_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt with XChaCha20-Poly1305.
///
/// Every failure, including a nonce of the wrong length, collapses into
/// `CryptoError::Authentication`.
pub fn decrypt(
    ciphertext: &[u8],
    nonce: &[u8],
    key: &[u8; KEY_LEN],
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Authentication);
    }

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}

/// Encrypt under a freshly drawn nonce. Returns (nonce, ciphertext).
pub fn seal(
    plaintext: &[u8],
    key: &[u8; KEY_LEN],
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let nonce = generate_nonce();
    let ciphertext = encrypt(plaintext, &nonce, key)?;
    Ok((nonce, ciphertext))
}
