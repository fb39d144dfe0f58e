//! Firmware-over-the-air delivery sessions.
//!
//! Flow, driven entirely by device check-ins:
//!
//! ```text
//! Queued ──(next check-in: manifest sent)──▶ ManifestSent
//! ManifestSent ──(manifest_ack = true)──▶ Active
//! Active ──(chunk i sent, ack {i, verified})──▶ Active | Completed
//! ```
//!
//! A chunk index only advances on a verified acknowledgment of the chunk
//! currently due. A failed verification pins the same chunk for resending
//! until the device reports success; there is no retry limit and no expiry.
//! Operators abandon a stuck session by removing it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::ports::BlobStore;
use crate::error::FotaError;
use crate::firmware::{FirmwareArtifact, Manifest};

use super::chunked::{self, ChunkFrame};

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FotaState {
    /// Created by an operator; the manifest goes out on the next check-in.
    Queued,
    /// Manifest delivered once; waiting for the device to accept it.
    ManifestSent,
    /// Chunk delivery in progress.
    Active,
    /// Every chunk acknowledged and verified.
    Completed,
}

/// A device acknowledgment, normalised from whichever wire shape carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaAck {
    Manifest { accepted: bool },
    Chunk { index: u32, verified: bool },
}

/// What an acknowledgment did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    ManifestAccepted,
    ManifestDeclined,
    /// Chunk verified; `next` is now due.
    Advanced { next: u32 },
    /// Chunk failed verification and will be resent.
    RetryScheduled { index: u32 },
    /// Final chunk verified.
    Completed,
    /// Not applicable in the current state, or not for the chunk due.
    Ignored,
}

/// Payload attached to a check-in response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FotaOutput {
    Handshake { manifest: Manifest, next_chunk: u32 },
    Chunk(ChunkFrame),
}

/// Operator view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub device_id: String,
    pub version: String,
    pub state: FotaState,
    pub current_chunk_index: u32,
    pub total_chunks: u32,
    pub last_ack_chunk_index: Option<u32>,
    pub last_ack_verified: bool,
    pub retry_chunk_index: Option<u32>,
    pub retries: u32,
    pub chunks_sent: u32,
    pub created_at: DateTime<Utc>,
}

// ── Session ───────────────────────────────────────────────────

/// Live state of one firmware delivery to one device.
#[derive(Debug, Clone)]
pub struct FotaSession {
    device_id: String,
    artifact: Arc<FirmwareArtifact>,
    manifest: Manifest,
    state: FotaState,
    current_chunk_index: u32,
    last_ack_chunk_index: Option<u32>,
    last_ack_verified: bool,
    retry_chunk_index: Option<u32>,
    retries: u32,
    chunks_sent: u32,
    created_at: DateTime<Utc>,
}

impl FotaSession {
    pub fn new(
        device_id: &str,
        artifact: Arc<FirmwareArtifact>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let manifest = artifact.manifest();
        Self {
            device_id: device_id.to_string(),
            artifact,
            manifest,
            state: FotaState::Queued,
            current_chunk_index: 0,
            last_ack_chunk_index: None,
            last_ack_verified: false,
            retry_chunk_index: None,
            retries: 0,
            chunks_sent: 0,
            created_at,
        }
    }

    pub fn state(&self) -> FotaState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == FotaState::Completed
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn current_chunk_index(&self) -> u32 {
        self.current_chunk_index
    }

    pub fn last_ack_chunk_index(&self) -> Option<u32> {
        self.last_ack_chunk_index
    }

    pub fn retry_chunk_index(&self) -> Option<u32> {
        self.retry_chunk_index
    }

    /// Chunk the next check-in would carry, if any.
    pub fn due_chunk(&self) -> Option<u32> {
        if self.state != FotaState::Active {
            return None;
        }
        let index = self.retry_chunk_index.unwrap_or(self.current_chunk_index);
        (index < self.manifest.total_chunks).then_some(index)
    }

    /// Fold one device acknowledgment into the session.
    pub fn apply_ack(&mut self, ack: FotaAck) -> AckOutcome {
        match (self.state, ack) {
            (FotaState::ManifestSent, FotaAck::Manifest { accepted: true }) => {
                self.state = FotaState::Active;
                AckOutcome::ManifestAccepted
            }
            (FotaState::ManifestSent, FotaAck::Manifest { accepted: false }) => {
                AckOutcome::ManifestDeclined
            }
            (FotaState::Active, FotaAck::Chunk { index, verified }) => {
                if index != self.current_chunk_index || index >= self.manifest.total_chunks {
                    return AckOutcome::Ignored;
                }
                self.last_ack_chunk_index = Some(index);
                self.last_ack_verified = verified;

                if !verified {
                    self.retry_chunk_index = Some(index);
                    self.retries = self.retries.saturating_add(1);
                    return AckOutcome::RetryScheduled { index };
                }

                self.retry_chunk_index = None;
                self.current_chunk_index = index + 1;
                if self.current_chunk_index == self.manifest.total_chunks {
                    self.state = FotaState::Completed;
                    AckOutcome::Completed
                } else {
                    AckOutcome::Advanced {
                        next: self.current_chunk_index,
                    }
                }
            }
            _ => AckOutcome::Ignored,
        }
    }

    /// Produce what this check-in should carry for the session.
    ///
    /// A `Queued` session hands out its manifest and moves to
    /// `ManifestSent`. An `Active` session reads, encodes and signs the chunk
    /// due. A read failure leaves the session untouched so the same chunk is
    /// attempted on the next check-in.
    pub fn next_output(
        &mut self,
        blobs: &dyn BlobStore,
        secret: &[u8],
    ) -> Result<Option<FotaOutput>, FotaError> {
        match self.state {
            FotaState::Queued => {
                self.state = FotaState::ManifestSent;
                Ok(Some(FotaOutput::Handshake {
                    manifest: self.manifest.clone(),
                    next_chunk: self.current_chunk_index,
                }))
            }
            FotaState::Active => {
                let Some(index) = self.due_chunk() else {
                    return Ok(None);
                };
                let frame = self.build_chunk(blobs, secret, index)?;
                self.chunks_sent = self.chunks_sent.saturating_add(1);
                Ok(Some(FotaOutput::Chunk(frame)))
            }
            FotaState::ManifestSent | FotaState::Completed => Ok(None),
        }
    }

    fn build_chunk(
        &self,
        blobs: &dyn BlobStore,
        secret: &[u8],
        index: u32,
    ) -> Result<ChunkFrame, FotaError> {
        let (offset, len) = self
            .artifact
            .chunk_span(index)
            .ok_or(FotaError::ChunkReadFailure)?;
        let bytes = blobs
            .read_at(&self.artifact.blob_location, offset, len)
            .map_err(|e| {
                log::warn!(
                    "ota: {} chunk {} read failed at offset {}: {}",
                    self.device_id,
                    index,
                    offset,
                    e
                );
                FotaError::ChunkReadFailure
            })?;
        Ok(chunked::build_frame(secret, index, &bytes, self.manifest.total_chunks))
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            device_id: self.device_id.clone(),
            version: self.manifest.version.clone(),
            state: self.state,
            current_chunk_index: self.current_chunk_index,
            total_chunks: self.manifest.total_chunks,
            last_ack_chunk_index: self.last_ack_chunk_index,
            last_ack_verified: self.last_ack_verified,
            retry_chunk_index: self.retry_chunk_index,
            retries: self.retries,
            chunks_sent: self.chunks_sent,
            created_at: self.created_at,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────
