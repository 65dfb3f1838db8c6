use rand_core::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::encrypt::{decrypt, seal};
use crate::envelope::{self, Envelope, ResponseEnvelope};
use crate::error::CryptoError;
use crate::keys::{KEY_LEN, ServerKeyPair};
use crate::session::{SessionKeys, derive_client_session, derive_server_session};

/// A decrypted request together with the keys needed to answer it.
/// No `Debug`: the plaintext must not end up in logs.
pub struct OpenedRequest {
    pub plaintext: Vec<u8>,
    pub keys: SessionKeys,
    pub ts: Option<i64>,
}

/// Server: derive this request's keys from its ephemeral key and decrypt it.
pub fn open_request(
    server: &ServerKeyPair,
    envelope: &Envelope,
) -> Result<OpenedRequest, CryptoError> {
    let decoded = envelope::decode(envelope)?;
    let keys = derive_server_session(server, &decoded.ephemeral_pub)?;
    let plaintext = decrypt(&decoded.ciphertext, &decoded.nonce, keys.rx())?;

    Ok(OpenedRequest {
        plaintext,
        keys,
        ts: decoded.ts,
    })
}

/// Server: encrypt the reply under the request's tx key and a fresh nonce.
pub fn seal_response(
    keys: &SessionKeys,
    plaintext: &[u8],
) -> Result<ResponseEnvelope, CryptoError> {
    let (nonce, ciphertext) = seal(plaintext, keys.tx())?;
    Ok(envelope::encode_response(&nonce, &ciphertext))
}

/// A sealed client request. `keys` must be kept to open the reply.
#[derive(Debug)]
pub struct ClientRequest {
    pub envelope: Envelope,
    pub keys: SessionKeys,
}

/// Client: generate a one-shot ephemeral keypair and seal a payload for the server.
pub fn seal_request(
    server_public: &[u8; KEY_LEN],
    plaintext: &[u8],
) -> Result<ClientRequest, CryptoError> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral).to_bytes();
    let keys = derive_client_session(&ephemeral, server_public)?;
    drop(ephemeral);

    let (nonce, ciphertext) = seal(plaintext, keys.tx())?;
    Ok(ClientRequest {
        envelope: envelope::encode(&ephemeral_pub, &nonce, &ciphertext),
        keys,
    })
}

/// Client: decrypt the server's reply.
pub fn open_response(
    keys: &SessionKeys,
    response: &ResponseEnvelope,
) -> Result<Vec<u8>, CryptoError> {
    let (nonce, ciphertext) = envelope::decode_response(response)?;
    decrypt(&ciphertext, &nonce, keys.rx())
}
