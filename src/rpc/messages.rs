//! Check-in request and response bodies.
//!
//! `fota_status` arrives in three shapes; all of them are normalised here
//! into [`FotaAck`] values so the session state machine sees one type:
//!
//! ```text
//! {"manifest_ack": true}                      → Manifest { accepted }
//! {"chunk_received": 4, "verified": false}    → Chunk { index: 4, verified: false }
//! {"chunk_4_ack": true, "chunk_5_ack": false} → Chunk {4, true}, Chunk {5, false}
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ota::{FotaAck, FotaOutput};

/// Decoded body of a check-in envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckInBody {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub config_ack: Option<Value>,
    #[serde(default)]
    pub command_result: Option<Value>,
    #[serde(default)]
    pub fota_status: Option<Value>,
}

impl CheckInBody {
    /// Acknowledgments carried by `fota_status`, in application order.
    pub fn fota_acks(&self) -> Result<Vec<FotaAck>, FotaStatusError> {
        match &self.fota_status {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(status) => decode_fota_status(status),
        }
    }
}

/// Response to an authenticated check-in. Absent keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckInResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_update: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fota: Option<FotaOutput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaStatusError {
    /// `fota_status` is not a JSON object.
    NotAnObject,
    /// A recognised key has a value of the wrong type.
    BadValue(&'static str),
    /// `chunk_received` without `verified`.
    MissingVerified,
    /// The object carries none of the recognised keys.
    Unrecognised,
}

impl fmt::Display for FotaStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "fota_status must be an object"),
            Self::BadValue(key) => write!(f, "fota_status.{key} has the wrong type"),
            Self::MissingVerified => write!(f, "chunk_received requires verified"),
            Self::Unrecognised => write!(f, "fota_status has no recognised keys"),
        }
    }
}

/// Normalise any accepted `fota_status` shape.
pub fn decode_fota_status(status: &Value) -> Result<Vec<FotaAck>, FotaStatusError> {
    let obj = status.as_object().ok_or(FotaStatusError::NotAnObject)?;
    if obj.is_empty() {
        return Ok(Vec::new());
    }

    let mut acks = Vec::new();

    if let Some(v) = obj.get("manifest_ack") {
        let accepted = v.as_bool().ok_or(FotaStatusError::BadValue("manifest_ack"))?;
        acks.push(FotaAck::Manifest { accepted });
    }

    if let Some(v) = obj.get("chunk_received") {
        let index = as_index(v).ok_or(FotaStatusError::BadValue("chunk_received"))?;
        let verified = obj
            .get("verified")
            .ok_or(FotaStatusError::MissingVerified)?
            .as_bool()
            .ok_or(FotaStatusError::BadValue("verified"))?;
        acks.push(FotaAck::Chunk { index, verified });
    }

    acks.extend(per_index_flags(obj)?);

    if acks.is_empty() {
        return Err(FotaStatusError::Unrecognised);
    }
    Ok(acks)
}

/// `chunk_<N>_ack` flags, sorted by index.
fn per_index_flags(obj: &Map<String, Value>) -> Result<Vec<FotaAck>, FotaStatusError> {
    let mut flags = Vec::new();
    for (key, value) in obj {
        let Some(index) = key
            .strip_prefix("chunk_")
            .and_then(|rest| rest.strip_suffix("_ack"))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        let verified = value
            .as_bool()
            .ok_or(FotaStatusError::BadValue("chunk_<N>_ack"))?;
        flags.push(FotaAck::Chunk { index, verified });
    }
    flags.sort_by_key(|ack| match ack {
        FotaAck::Chunk { index, .. } => *index,
        FotaAck::Manifest { .. } => 0,
    });
    Ok(flags)
}

fn as_index(v: &Value) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}
