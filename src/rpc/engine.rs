//! Check-in engine — the single entry point devices poll.
//!
//! **Transport-decoupled**: the engine takes raw request bytes and returns a
//! [`CheckInResponse`]; the HTTP adapter only moves bytes. Every request
//! passes through a two-gate pipeline before any state is touched:
//!
//! 1. **Authentication gate** — envelope decode, nonce and HMAC checks.
//! 2. **Rate limiting** — per-device token bucket (via `burster`).
//!
//! Then, with the device lock still held:
//!
//! 1. apply acknowledgments (config, command result, FOTA)
//! 2. drain at most one pending config and one pending command
//! 3. advance the FOTA session, attaching its output
//!
//! Acknowledgment and dispatch happen in the same round-trip.

use std::sync::Arc;

use log::{debug, warn};

use crate::adapters::time::utc_now;
use crate::app::events::AppEvent;
use crate::app::ports::{BlobStore, EventSink};
use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, DeviceState};

use super::auth::{Authenticated, Authenticator, Rejection};
use super::envelope::SecureEnvelope;
use super::messages::{CheckInBody, CheckInResponse};
use super::ota::{AckOutcome, FotaAck, FotaOutput, FotaState};

pub struct CheckInEngine {
    auth: Authenticator,
    blobs: Arc<dyn BlobStore>,
    events: Arc<dyn EventSink>,
}

impl CheckInEngine {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        blobs: Arc<dyn BlobStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            auth: Authenticator::new(registry),
            blobs,
            events,
        }
    }

    /// Handle one check-in request body.
    pub fn check_in(&self, raw: &[u8]) -> Result<CheckInResponse> {
        let envelope = SecureEnvelope::parse(raw).map_err(|reason| self.reject(reason.into()))?;

        let Authenticated {
            mut device,
            body,
            nonce,
        } = self.auth.validate(&envelope).map_err(|r| self.reject(r))?;

        let device_id = device.device_id().to_string();
        self.events.emit(&AppEvent::Authenticated {
            device_id: device_id.clone(),
            nonce,
        });

        if !device.check_rate_limit() {
            self.events.emit(&AppEvent::RateLimited { device_id });
            return Err(Error::RateLimited);
        }
        device.last_seen = Some(utc_now());

        Ok(self.process(&mut device, body))
    }

    fn reject(&self, rejection: Rejection) -> Error {
        let reason = rejection.reason;
        self.events.emit(&AppEvent::AuthRejected {
            device_id: rejection.device_id,
            reason,
        });
        Error::Auth(reason)
    }

    fn process(&self, device: &mut DeviceState, body: CheckInBody) -> CheckInResponse {
        let device_id = device.device_id().to_string();

        // A session completed on an earlier check-in is collected now.
        if device.fota.as_ref().is_some_and(|s| s.is_completed()) {
            if let Some(done) = device.fota.take() {
                self.events.emit(&AppEvent::FotaCompleted {
                    device_id: device_id.clone(),
                    version: done.manifest().version.clone(),
                });
            }
        }

        // 1. Acknowledgments
        let acks = match body.fota_acks() {
            Ok(acks) => acks,
            Err(e) => {
                warn!("checkin: {} ignoring fota_status: {}", device_id, e);
                Vec::new()
            }
        };
        if let Some(ack) = body.config_ack {
            device.last_config_ack = Some(ack);
            self.events.emit(&AppEvent::ConfigAcknowledged {
                device_id: device_id.clone(),
            });
        }
        if let Some(result) = body.command_result {
            device.last_command_result = Some(result);
            self.events.emit(&AppEvent::CommandResult {
                device_id: device_id.clone(),
            });
        }
        self.apply_fota_acks(device, &acks);

        // 2. Pending work
        let config_update = device.pending.config.take();
        if config_update.is_some() {
            self.events.emit(&AppEvent::ConfigDelivered {
                device_id: device_id.clone(),
            });
        }
        let command = device.pending.command.take();
        if command.is_some() {
            self.events.emit(&AppEvent::CommandDelivered {
                device_id: device_id.clone(),
            });
        }

        // 3. FOTA
        let fota = self.advance_fota(device);

        CheckInResponse {
            config_update,
            command,
            fota,
        }
    }

    fn apply_fota_acks(&self, device: &mut DeviceState, acks: &[FotaAck]) {
        if acks.is_empty() {
            return;
        }
        let device_id = device.device_id().to_string();
        let Some(session) = device.fota.as_mut() else {
            debug!("checkin: {} sent FOTA status with no session", device_id);
            return;
        };

        for ack in acks {
            let before = session.state();
            let outcome = session.apply_ack(*ack);
            match outcome {
                AckOutcome::RetryScheduled { index } => {
                    self.events.emit(&AppEvent::ChunkRejected {
                        device_id: device_id.clone(),
                        index,
                    });
                }
                AckOutcome::Ignored => {
                    debug!("checkin: {} ack {:?} ignored in {:?}", device_id, ack, before);
                }
                AckOutcome::Advanced { .. } | AckOutcome::Completed => {
                    if let FotaAck::Chunk { index, .. } = *ack {
                        self.events.emit(&AppEvent::ChunkAccepted {
                            device_id: device_id.clone(),
                            index,
                        });
                    }
                }
                AckOutcome::ManifestAccepted | AckOutcome::ManifestDeclined => {}
            }
            self.emit_transition(&device_id, before, session.state());
        }
    }

    fn advance_fota(&self, device: &mut DeviceState) -> Option<FotaOutput> {
        let device_id = device.device_id().to_string();
        let secret = &device.secret;
        let session = device.fota.as_mut()?;

        let before = session.state();
        let result = session.next_output(self.blobs.as_ref(), secret);
        self.emit_transition(&device_id, before, session.state());

        match result {
            Ok(Some(FotaOutput::Chunk(frame))) => {
                self.events.emit(&AppEvent::ChunkSent {
                    device_id,
                    index: frame.chunk_number,
                });
                Some(FotaOutput::Chunk(frame))
            }
            Ok(output) => output,
            Err(_) => {
                if let Some(index) = session.due_chunk() {
                    self.events.emit(&AppEvent::ChunkReadFailed { device_id, index });
                }
                None
            }
        }
    }

    fn emit_transition(&self, device_id: &str, from: FotaState, to: FotaState) {
        if from != to {
            self.events.emit(&AppEvent::FotaStateChanged {
                device_id: device_id.to_string(),
                from,
                to,
            });
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::blob_store::MemoryBlobStore;
    use crate::config::{DeviceKey, RateLimitConfig};
    use crate::error::AuthError;
    use crate::firmware::FirmwareStore;
    use crate::rpc::ota::FotaSession;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AppEvent>>);

    impl EventSink for Recorder {
        fn emit(&self, event: &AppEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    struct Rig {
        registry: Arc<DeviceRegistry>,
        firmware: FirmwareStore,
        events: Arc<Recorder>,
        engine: CheckInEngine,
    }

    fn rig() -> Rig {
        let registry = Arc::new(DeviceRegistry::new(
            &[DeviceKey {
                device_id: "inv-1".into(),
                secret: "psk".into(),
            }],
            RateLimitConfig { burst: 100, per_second: 100 },
        ));
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let firmware = FirmwareStore::new(Arc::clone(&blobs), 1 << 20);
        let events = Arc::new(Recorder::default());
        let engine = CheckInEngine::new(Arc::clone(&registry), blobs, events.clone());
        Rig {
            registry,
            firmware,
            events,
            engine,
        }
    }

    fn raw(nonce: u64, body: &Value) -> Vec<u8> {
        serde_json::to_vec(&SecureEnvelope::seal(b"psk", nonce, body).unwrap()).unwrap()
    }

    #[test]
    fn malformed_outer_json_is_auth_failure() {
        let r = rig();
        assert_eq!(
            r.engine.check_in(b"{}").unwrap_err(),
            Error::Auth(AuthError::MalformedEnvelope)
        );
    }

    #[test]
    fn pending_items_are_delivered_once() {
        let r = rig();
        {
            let mut dev = r.registry.lock("inv-1").unwrap();
            dev.pending.config.set(json!({"sampling_rate": 10}));
            dev.pending.command.set(json!({"action": "read_register"}));
        }

        let first = r.engine.check_in(&raw(1, &json!({"device_id": "inv-1"}))).unwrap();
        assert_eq!(first.config_update, Some(json!({"sampling_rate": 10})));
        assert_eq!(first.command, Some(json!({"action": "read_register"})));

        let second = r.engine.check_in(&raw(2, &json!({"device_id": "inv-1"}))).unwrap();
        assert_eq!(second, CheckInResponse::default());
    }

    #[test]
    fn acks_are_recorded_on_device() {
        let r = rig();
        r.engine
            .check_in(&raw(
                1,
                &json!({
                    "device_id": "inv-1",
                    "config_ack": {"ok": true},
                    "command_result": "done",
                }),
            ))
            .unwrap();
        let dev = r.registry.lock("inv-1").unwrap();
        assert_eq!(dev.last_config_ack, Some(json!({"ok": true})));
        assert_eq!(dev.last_command_result, Some(json!("done")));
        assert!(dev.last_seen.is_some());
    }

    #[test]
    fn ack_without_session_is_ignored() {
        let r = rig();
        let resp = r
            .engine
            .check_in(&raw(
                1,
                &json!({
                    "device_id": "inv-1",
                    "fota_status": {"chunk_received": 0, "verified": true},
                }),
            ))
            .unwrap();
        assert!(resp.fota.is_none());
    }

    #[test]
    fn rejected_requests_do_not_drain_queues() {
        let r = rig();
        r.registry
            .lock("inv-1")
            .unwrap()
            .pending
            .config
            .set(json!(1));

        let env = SecureEnvelope::seal(b"wrong", 1, &json!({"device_id": "inv-1"})).unwrap();
        let err = r.engine.check_in(&serde_json::to_vec(&env).unwrap()).unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::SignatureInvalid));
        assert!(r.registry.lock("inv-1").unwrap().pending.config.is_pending());

        let events = r.events.0.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::AuthRejected { reason: AuthError::SignatureInvalid, .. }
        )));
    }

    #[test]
    fn completed_session_is_collected_on_following_check_in() {
        let r = rig();
        let artifact = r.firmware.upload("1.1", b"tiny", 8).unwrap();
        r.registry.lock("inv-1").unwrap().fota =
            Some(FotaSession::new("inv-1", artifact, utc_now()));

        let m = r.engine.check_in(&raw(1, &json!({"device_id": "inv-1"}))).unwrap();
        assert!(matches!(m.fota, Some(FotaOutput::Handshake { .. })));

        let c = r
            .engine
            .check_in(&raw(
                2,
                &json!({"device_id": "inv-1", "fota_status": {"manifest_ack": true}}),
            ))
            .unwrap();
        assert!(matches!(c.fota, Some(FotaOutput::Chunk(_))));

        let done = r
            .engine
            .check_in(&raw(3, &json!({"device_id": "inv-1", "fota_status": {"chunk_0_ack": true}})))
            .unwrap();
        assert!(done.fota.is_none());
        assert!(r.registry.lock("inv-1").unwrap().fota.as_ref().unwrap().is_completed());

        let after = r.engine.check_in(&raw(4, &json!({"device_id": "inv-1"}))).unwrap();
        assert!(after.fota.is_none());
        assert!(r.registry.lock("inv-1").unwrap().fota.is_none());

        let events = r.events.0.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, AppEvent::FotaCompleted { .. })));
    }

    #[test]
    fn unreadable_chunk_is_omitted_and_retried() {
        let r = rig();
        let artifact = Arc::new(
            crate::firmware::FirmwareArtifact::describe("ghost", &[0u8; 16], 8, 1024).unwrap(),
        );
        r.registry.lock("inv-1").unwrap().fota =
            Some(FotaSession::new("inv-1", artifact, utc_now()));

        r.engine.check_in(&raw(1, &json!({"device_id": "inv-1"}))).unwrap();
        let resp = r
            .engine
            .check_in(&raw(
                2,
                &json!({"device_id": "inv-1", "fota_status": {"manifest_ack": true}}),
            ))
            .unwrap();
        assert!(resp.fota.is_none());

        let dev = r.registry.lock("inv-1").unwrap();
        let session = dev.fota.as_ref().unwrap();
        assert_eq!(session.state(), FotaState::Active);
        assert_eq!(session.due_chunk(), Some(0));
        drop(dev);

        let events = r.events.0.lock().unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::ChunkReadFailed { index: 0, .. })));
    }
}
