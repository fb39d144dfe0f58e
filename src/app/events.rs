//! Outbound application events.
//!
//! The check-in engine and the operator service emit these through the
//! [`EventSink`](super::ports::EventSink) port.

use crate::error::AuthError;
use crate::rpc::ota::FotaState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// An envelope passed the authentication gate.
    Authenticated { device_id: String, nonce: u64 },

    /// An envelope was rejected. `device_id` is only set when the body could
    /// be decoded far enough to name one.
    AuthRejected {
        device_id: Option<String>,
        reason: AuthError,
    },

    /// A device exceeded its check-in rate.
    RateLimited { device_id: String },

    /// A pending configuration was handed to the device.
    ConfigDelivered { device_id: String },

    /// A pending command was handed to the device.
    CommandDelivered { device_id: String },

    /// The device acknowledged a configuration update.
    ConfigAcknowledged { device_id: String },

    /// The device reported the result of a command.
    CommandResult { device_id: String },

    /// A firmware image was added to the catalog.
    FirmwareUploaded { version: String, size: u64 },

    /// An operator queued a firmware update for a device.
    FotaQueued { device_id: String, version: String },

    /// An operator removed a session before completion.
    FotaAborted { device_id: String },

    /// A session changed state.
    FotaStateChanged {
        device_id: String,
        from: FotaState,
        to: FotaState,
    },

    /// A chunk was attached to a check-in response.
    ChunkSent { device_id: String, index: u32 },

    /// The device verified the chunk that was due; delivery moved on.
    ChunkAccepted { device_id: String, index: u32 },

    /// The device reported a failed verification for a chunk.
    ChunkRejected { device_id: String, index: u32 },

    /// The chunk could not be read; it will be retried on the next check-in.
    ChunkReadFailed { device_id: String, index: u32 },

    /// A completed session was collected.
    FotaCompleted { device_id: String, version: String },
}
