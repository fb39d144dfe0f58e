//! Chunk framing for firmware delivery.
//!
//! Each chunk travels as base64 text with an HMAC-SHA256 tag keyed by the
//! device secret. The tag covers the chunk index as well as the data:
//!
//! ```text
//! mac = hex(HMAC-SHA256(secret, "{chunk_number}.{data}"))
//! ```
//!
//! so a captured chunk cannot be replayed into a different slot of the same
//! image.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use serde::{Deserialize, Serialize};

/// One chunk as it appears in a check-in response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFrame {
    pub chunk_number: u32,
    /// Base64 (standard alphabet, padded) chunk bytes.
    pub data: String,
    /// Lowercase hex HMAC tag.
    pub mac: String,
    pub total_chunks: u32,
}

impl ChunkFrame {
    /// Decode the chunk bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        Base64.decode(&self.data)
    }

    /// Device-side check: does the tag match this index and data?
    pub fn verify(&self, secret: &[u8]) -> bool {
        verify_chunk(secret, self.chunk_number, &self.data, &self.mac)
    }
}

/// Canonical string the chunk tag is computed over.
pub fn signing_input(index: u32, data_b64: &str) -> String {
    format!("{index}.{data_b64}")
}

/// Hex tag for chunk `index` carrying `data_b64`.
pub fn sign_chunk(secret: &[u8], index: u32, data_b64: &str) -> String {
    hex::encode(hmac_sha256::HMAC::mac(signing_input(index, data_b64), secret))
}

/// Constant-time check of a chunk tag.
pub fn verify_chunk(secret: &[u8], index: u32, data_b64: &str, mac_hex: &str) -> bool {
    let Ok(tag) = hex::decode(mac_hex) else {
        return false;
    };
    let Ok(tag) = <[u8; 32]>::try_from(tag.as_slice()) else {
        return false;
    };
    hmac_sha256::HMAC::verify(signing_input(index, data_b64), secret, &tag)
}

/// Encode and sign raw chunk bytes.
pub fn build_frame(secret: &[u8], index: u32, bytes: &[u8], total_chunks: u32) -> ChunkFrame {
    let data = Base64.encode(bytes);
    let mac = sign_chunk(secret, index, &data);
    ChunkFrame {
        chunk_number: index,
        data,
        mac,
        total_chunks,
    }
}

// ── Tests ────────────────────────────────────────────────────
