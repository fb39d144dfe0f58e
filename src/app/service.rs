//! Application service — the hexagonal core.
//!
//! [`CloudService`] owns the device registry, the firmware catalog, the
//! check-in engine and the telemetry ledger. Adapters hand it raw requests
//! and operator commands; all storage and logging flows through port traits
//! injected at construction, so the whole service is testable with in-memory
//! adapters.
//!
//! ```text
//!  HTTP adapter ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                   │       CloudService        │
//!   BlobStore ◀──── │ Registry · FOTA · Queues  │
//!                   └──────────────────────────┘
//! ```

use std::sync::Arc;

use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::adapters::time::utc_now;
use crate::config::ServerConfig;
use crate::error::{Error, FotaError, Result};
use crate::firmware::{FirmwareStore, Manifest};
use crate::registry::{DeviceRegistry, DeviceState, DeviceStatus};
use crate::rpc::engine::CheckInEngine;
use crate::rpc::messages::CheckInResponse;
use crate::rpc::ota::{FotaSession, SessionStatus};
use crate::telemetry::{TelemetryLedger, UploadReceipt};

use super::commands::OperatorCommand;
use super::events::AppEvent;
use super::ports::{BlobStore, EventSink};

/// Liveness summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub devices: usize,
    pub firmware: usize,
}

// ───────────────────────────────────────────────────────────────
// CloudService
// ───────────────────────────────────────────────────────────────

pub struct CloudService {
    config: ServerConfig,
    registry: Arc<DeviceRegistry>,
    firmware: FirmwareStore,
    engine: CheckInEngine,
    telemetry: TelemetryLedger,
    events: Arc<dyn EventSink>,
}

impl CloudService {
    /// Build the service from a validated configuration.
    pub fn new(
        config: ServerConfig,
        blobs: Arc<dyn BlobStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(&config.devices, config.rate_limit));
        let firmware = FirmwareStore::new(Arc::clone(&blobs), config.max_firmware_size);
        let engine = CheckInEngine::new(Arc::clone(&registry), blobs, Arc::clone(&events));
        let telemetry = TelemetryLedger::new(config.telemetry);
        info!(
            "CloudService ready: {} devices, blobs in {}",
            registry.len(),
            firmware.blobs().describe()
        );
        Self {
            config,
            registry,
            firmware,
            engine,
            telemetry,
            events,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // ── Device channel ────────────────────────────────────────

    /// Run one device check-in from the raw request body.
    pub fn check_in(&self, raw: &[u8]) -> Result<CheckInResponse> {
        self.engine.check_in(raw)
    }

    /// Store one telemetry upload.
    pub fn ingest_telemetry(&self, payload: Value) -> Result<UploadReceipt> {
        self.telemetry.record(payload)
    }

    pub fn telemetry(&self) -> &TelemetryLedger {
        &self.telemetry
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an operator command to the named device.
    pub fn handle_command(&self, cmd: OperatorCommand) -> Result<()> {
        let mut device = self
            .registry
            .lock(cmd.device_id())
            .ok_or(Error::UnknownDevice)?;

        match cmd {
            OperatorCommand::QueueConfig { device_id, config } => {
                if device.pending.config.set(config).is_some() {
                    info!("queue: {} undelivered config replaced", device_id);
                }
            }
            OperatorCommand::QueueCommand { device_id, command } => {
                if device.pending.command.set(command).is_some() {
                    info!("queue: {} undelivered command replaced", device_id);
                }
            }
            OperatorCommand::QueueUpdate { device_id, version } => {
                self.queue_update(&mut device, &device_id, &version)?;
            }
            OperatorCommand::AbortUpdate { device_id } => {
                if device.fota.take().is_none() {
                    return Err(FotaError::SessionNotFound.into());
                }
                self.events.emit(&AppEvent::FotaAborted { device_id });
            }
        }
        Ok(())
    }

    fn queue_update(&self, device: &mut DeviceState, device_id: &str, version: &str) -> Result<()> {
        let artifact = self
            .firmware
            .get(version)
            .ok_or(FotaError::UnknownFirmware)?;

        // An unfinished session always wins over a new request.
        if device.fota.as_ref().is_some_and(|s| !s.is_completed()) {
            return Err(FotaError::SessionActive.into());
        }

        device.fota = Some(FotaSession::new(device_id, artifact, utc_now()));
        self.events.emit(&AppEvent::FotaQueued {
            device_id: device_id.to_string(),
            version: version.to_string(),
        });
        Ok(())
    }

    // ── Firmware catalog ──────────────────────────────────────

    /// Add an image to the catalog. `chunk_size` falls back to the
    /// configured default.
    pub fn upload_firmware(
        &self,
        version: &str,
        data: &[u8],
        chunk_size: Option<u32>,
    ) -> Result<Manifest> {
        let chunk_size = chunk_size.unwrap_or(self.config.default_chunk_size);
        let artifact = self.firmware.upload(version, data, chunk_size)?;
        self.events.emit(&AppEvent::FirmwareUploaded {
            version: artifact.version.clone(),
            size: artifact.size,
        });
        Ok(artifact.manifest())
    }

    pub fn list_firmware(&self) -> Vec<Manifest> {
        self.firmware.manifests()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn session_status(&self, device_id: &str) -> Result<SessionStatus> {
        let device = self.registry.lock(device_id).ok_or(Error::UnknownDevice)?;
        device
            .fota
            .as_ref()
            .map(FotaSession::status)
            .ok_or(FotaError::SessionNotFound.into())
    }

    pub fn device_status(&self, device_id: &str) -> Result<DeviceStatus> {
        self.registry
            .lock(device_id)
            .map(|device| device.status())
            .ok_or(Error::UnknownDevice)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            devices: self.registry.len(),
            firmware: self.firmware.len(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
