use std::fmt;

use blake2::{Blake2b512, Digest};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::keys::{KEY_LEN, ServerKeyPair};

/// Directional symmetric keys derived from one key exchange.
///
/// `rx` decrypts what the peer sent, `tx` encrypts what we send back.
/// Scoped to a single request and wiped on drop.
#[derive(ZeroizeOnDrop)]
pub struct SessionKeys {
    rx: [u8; KEY_LEN],
    tx: [u8; KEY_LEN],
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("rx", &"[REDACTED]")
            .field("tx", &"[REDACTED]")
            .finish()
    }
}

impl SessionKeys {
    pub fn rx(&self) -> &[u8; KEY_LEN] {
        &self.rx
    }

    pub fn tx(&self) -> &[u8; KEY_LEN] {
        &self.tx
    }
}

/// Server side of the exchange: server rx == client tx, server tx == client rx.
pub fn derive_server_session(
    server: &ServerKeyPair,
    client_public: &[u8; KEY_LEN],
) -> Result<SessionKeys, CryptoError> {
    let client_pk = PublicKey::from(*client_public);
    let shared = server.secret().diffie_hellman(&client_pk);
    let server_pk = server.public_key_bytes();

    let mut okm = kx_digest(&shared, client_public, &server_pk)?;
    let keys = split(&okm, Side::Server);
    okm.zeroize();
    Ok(keys)
}

/// Client side of the exchange, used with a freshly generated ephemeral secret.
pub fn derive_client_session(
    client_secret: &StaticSecret,
    server_public: &[u8; KEY_LEN],
) -> Result<SessionKeys, CryptoError> {
    let client_pk = PublicKey::from(client_secret).to_bytes();
    let shared = client_secret.diffie_hellman(&PublicKey::from(*server_public));

    let mut okm = kx_digest(&shared, &client_pk, server_public)?;
    let keys = split(&okm, Side::Client);
    okm.zeroize();
    Ok(keys)
}

enum Side {
    Client,
    Server,
}

/// BLAKE2b-512(q || client_pk || server_pk)
fn kx_digest(
    shared: &SharedSecret,
    client_pk: &[u8; KEY_LEN],
    server_pk: &[u8; KEY_LEN],
) -> Result<[u8; 2 * KEY_LEN], CryptoError> {
    // Low-order peer points give an all-zero secret
    if !shared.was_contributory() {
        return Err(CryptoError::KeyExchange);
    }

    let mut hasher = Blake2b512::new();
    hasher.update(shared.as_bytes());
    hasher.update(client_pk);
    hasher.update(server_pk);
    let digest = hasher.finalize();

    let mut okm = [0u8; 2 * KEY_LEN];
    okm.copy_from_slice(&digest);
    Ok(okm)
}

fn split(okm: &[u8; 2 * KEY_LEN], side: Side) -> SessionKeys {
    let mut first = [0u8; KEY_LEN];
    let mut second = [0u8; KEY_LEN];
    first.copy_from_slice(&okm[..KEY_LEN]);
    second.copy_from_slice(&okm[KEY_LEN..]);

    match side {
        Side::Client => SessionKeys { rx: first, tx: second },
        Side::Server => SessionKeys { rx: second, tx: first },
    }
}
