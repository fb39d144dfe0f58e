//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events through
//! the `log` facade, one line per event. An audit-stream adapter would
//! implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AppEvent) {
        match event {
            AppEvent::Authenticated { device_id, nonce } => {
                info!("AUTH  | device={} nonce={} accepted", device_id, nonce);
            }
            AppEvent::AuthRejected { device_id, reason } => {
                warn!(
                    "AUTH  | device={} rejected: {}",
                    device_id.as_deref().unwrap_or("?"),
                    reason
                );
            }
            AppEvent::RateLimited { device_id } => {
                warn!("AUTH  | device={} rate limited", device_id);
            }
            AppEvent::ConfigDelivered { device_id } => {
                info!("QUEUE | device={} config delivered", device_id);
            }
            AppEvent::CommandDelivered { device_id } => {
                info!("QUEUE | device={} command delivered", device_id);
            }
            AppEvent::ConfigAcknowledged { device_id } => {
                info!("QUEUE | device={} config acknowledged", device_id);
            }
            AppEvent::CommandResult { device_id } => {
                info!("QUEUE | device={} command result received", device_id);
            }
            AppEvent::FirmwareUploaded { version, size } => {
                info!("FW    | version={} size={}B uploaded", version, size);
            }
            AppEvent::FotaQueued { device_id, version } => {
                info!("FOTA  | device={} version={} queued", device_id, version);
            }
            AppEvent::FotaAborted { device_id } => {
                warn!("FOTA  | device={} session aborted by operator", device_id);
            }
            AppEvent::FotaStateChanged { device_id, from, to } => {
                info!("FOTA  | device={} {:?} -> {:?}", device_id, from, to);
            }
            AppEvent::ChunkSent { device_id, index } => {
                info!("FOTA  | device={} chunk {} sent", device_id, index);
            }
            AppEvent::ChunkAccepted { device_id, index } => {
                info!("FOTA  | device={} chunk {} verified", device_id, index);
            }
            AppEvent::ChunkRejected { device_id, index } => {
                warn!(
                    "FOTA  | device={} chunk {} failed verification, resending",
                    device_id, index
                );
            }
            AppEvent::ChunkReadFailed { device_id, index } => {
                warn!("FOTA  | device={} chunk {} unreadable, will retry", device_id, index);
            }
            AppEvent::FotaCompleted { device_id, version } => {
                info!("FOTA  | device={} version={} completed", device_id, version);
            }
        }
    }
}
