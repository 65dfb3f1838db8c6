use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::encrypt::NONCE_LEN;
use crate::error::CryptoError;
use crate::keys::KEY_LEN;

/// Client-to-server wire envelope. All binary fields are padded base64.
///
/// `ts` is unix seconds, carried for advisory freshness checks only; it is
/// not covered by the AEAD tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub ephemeral_pub: String,
    pub nonce: String,
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

/// Server-to-client wire envelope. The client already knows both public keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub nonce: String,
    pub ciphertext: String,
    pub ts: i64,
}

#[derive(Debug)]
pub struct DecodedEnvelope {
    pub ephemeral_pub: [u8; KEY_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub ts: Option<i64>,
}

pub fn encode(
    ephemeral_pub: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Envelope {
    Envelope {
        ephemeral_pub: BASE64.encode(ephemeral_pub),
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
        ts: Some(unix_now()),
    }
}

pub fn decode(envelope: &Envelope) -> Result<DecodedEnvelope, CryptoError> {
    let ephemeral_pub = decode_fixed::<KEY_LEN>(&envelope.ephemeral_pub, "ephemeral_pub")?;
    let nonce = decode_fixed::<NONCE_LEN>(&envelope.nonce, "nonce")?;
    let ciphertext = decode_field(&envelope.ciphertext, "ciphertext")?;

    Ok(DecodedEnvelope {
        ephemeral_pub,
        nonce,
        ciphertext,
        ts: envelope.ts,
    })
}

pub fn encode_response(nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> ResponseEnvelope {
    ResponseEnvelope {
        nonce: BASE64.encode(nonce),
        ciphertext: BASE64.encode(ciphertext),
        ts: unix_now(),
    }
}

/// Returns (nonce, ciphertext).
pub fn decode_response(
    response: &ResponseEnvelope,
) -> Result<([u8; NONCE_LEN], Vec<u8>), CryptoError> {
    let nonce = decode_fixed::<NONCE_LEN>(&response.nonce, "nonce")?;
    let ciphertext = decode_field(&response.ciphertext, "ciphertext")?;
    Ok((nonce, ciphertext))
}

/// Advisory freshness check on the unauthenticated `ts`.
///
/// Must never be the only replay defense: an attacker can rewrite `ts`.
pub fn within_replay_window(ts: Option<i64>, now: i64, window_secs: i64) -> bool {
    match ts {
        Some(ts) => (now - ts).abs() <= window_secs,
        None => false,
    }
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn decode_field(value: &str, field: &'static str) -> Result<Vec<u8>, CryptoError> {
    if value.is_empty() {
        return Err(CryptoError::Format(field));
    }
    BASE64.decode(value).map_err(|_| CryptoError::Format(field))
}

fn decode_fixed<const N: usize>(value: &str, field: &'static str) -> Result<[u8; N], CryptoError> {
    decode_field(value, field)?
        .try_into()
        .map_err(|_| CryptoError::Format(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_fields() {
        let envelope = encode(&[1u8; KEY_LEN], &[2u8; NONCE_LEN], b"cipher");
        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();

        let decoded = decode(&parsed).unwrap();
        assert_eq!(decoded.ephemeral_pub, [1u8; KEY_LEN]);
        assert_eq!(decoded.nonce, [2u8; NONCE_LEN]);
        assert_eq!(decoded.ciphertext, b"cipher");
        assert!(decoded.ts.is_some());
    }

    #[test]
    fn missing_or_invalid_fields_are_format_errors() {
        let good = encode(&[1u8; KEY_LEN], &[2u8; NONCE_LEN], b"cipher");

        let mut missing = good.clone();
        missing.ciphertext.clear();
        assert!(matches!(decode(&missing), Err(CryptoError::Format("ciphertext"))));

        let mut bad_b64 = good.clone();
        bad_b64.nonce = "***".into();
        assert!(matches!(decode(&bad_b64), Err(CryptoError::Format("nonce"))));

        let mut short_key = good.clone();
        short_key.ephemeral_pub = BASE64.encode([1u8; 16]);
        assert!(matches!(decode(&short_key), Err(CryptoError::Format("ephemeral_pub"))));

        let mut short_nonce = good;
        short_nonce.nonce = BASE64.encode([2u8; 12]);
        assert!(matches!(decode(&short_nonce), Err(CryptoError::Format("nonce"))));
    }

    #[test]
    fn ts_is_optional_on_the_wire() {
        let json = format!(
            r#"{{"ephemeral_pub":"{}","nonce":"{}","ciphertext":"AA=="}}"#,
            BASE64.encode([1u8; KEY_LEN]),
            BASE64.encode([2u8; NONCE_LEN])
        );
        let parsed: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decode(&parsed).unwrap().ts, None);
    }

    #[test]
    fn replay_window() {
        assert!(within_replay_window(Some(1_000), 1_100, 300));
        assert!(within_replay_window(Some(1_100), 1_000, 300));
        assert!(!within_replay_window(Some(1_000), 2_000, 300));
        assert!(!within_replay_window(None, 2_000, 300));
    }
}
