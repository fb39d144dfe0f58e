//! Secure envelope — the signed, nonce-tagged wrapper around every
//! authenticated device message.
//!
//! Wire format (JSON):
//! ```text
//! { "nonce": 7, "payload": "<base64 JSON body>", "mac": "<hex tag>" }
//! ```
//!
//! The tag is `HMAC-SHA256(secret, "{nonce}.{payload}")`, computed over the
//! payload exactly as transmitted (still base64).

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureEnvelope {
    pub nonce: u64,
    pub payload: String,
    pub mac: String,
}

impl SecureEnvelope {
    /// Parse the outer JSON document.
    pub fn parse(raw: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(raw).map_err(|_| AuthError::MalformedEnvelope)
    }

    /// Decode the base64 payload into raw body bytes.
    pub fn decode_payload(&self) -> Result<Vec<u8>, AuthError> {
        Base64
            .decode(self.payload.as_bytes())
            .map_err(|_| AuthError::MalformedEnvelope)
    }

    /// Canonical string covered by the tag.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.nonce, self.payload)
    }

    /// Constant-time comparison of the supplied tag against `secret`.
    ///
    /// Non-hex tags and tags of the wrong length never verify.
    pub fn verify_mac(&self, secret: &[u8]) -> bool {
        let Ok(tag) = hex::decode(&self.mac) else {
            return false;
        };
        let Ok(tag) = <[u8; 32]>::try_from(tag.as_slice()) else {
            return false;
        };
        hmac_sha256::HMAC::verify(self.signing_input(), secret, &tag)
    }

    /// Build a signed envelope around `body` — the device side of the
    /// protocol, used by the simulator and tests.
    pub fn seal<T: Serialize>(
        secret: &[u8],
        nonce: u64,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(body)?;
        Ok(Self::seal_bytes(secret, nonce, &json))
    }

    /// Like [`seal`](Self::seal) for an already-encoded body.
    pub fn seal_bytes(secret: &[u8], nonce: u64, body: &[u8]) -> Self {
        let payload = Base64.encode(body);
        let mac = hex::encode(compute_mac(secret, format!("{nonce}.{payload}").as_bytes()));
        Self { nonce, payload, mac }
    }
}

/// `HMAC-SHA256(secret, message)`.
pub fn compute_mac(secret: &[u8], message: &[u8]) -> [u8; 32] {
    hmac_sha256::HMAC::mac(message, secret)
}
