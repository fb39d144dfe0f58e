//! Mock adapters and a simulated device for integration tests.
//!
//! `RecordingSink` keeps every emitted event so tests can assert on the full
//! history; `SimDevice` signs check-ins the way real firmware does.

use std::sync::{Arc, Mutex};

use ecowatt_cloud::CloudService;
use ecowatt_cloud::adapters::blob_store::MemoryBlobStore;
use ecowatt_cloud::app::events::AppEvent;
use ecowatt_cloud::app::ports::EventSink;
use ecowatt_cloud::config::{DeviceKey, RateLimitConfig, ServerConfig};
use ecowatt_cloud::rpc::envelope::SecureEnvelope;
use serde_json::Value;

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AppEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Fixture ───────────────────────────────────────────────────

pub const DEVICES: [(&str, &str); 2] = [("inv-001", "secret-one"), ("inv-002", "secret-two")];

pub fn config() -> ServerConfig {
    ServerConfig {
        devices: DEVICES
            .iter()
            .map(|(id, secret)| DeviceKey {
                device_id: (*id).to_string(),
                secret: (*secret).to_string(),
            })
            .collect(),
        rate_limit: RateLimitConfig {
            burst: 1000,
            per_second: 1000,
        },
        ..ServerConfig::default()
    }
}

pub fn service_with(config: ServerConfig) -> (CloudService, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let svc = CloudService::new(config, Arc::new(MemoryBlobStore::new()), sink.clone());
    (svc, sink)
}

pub fn service() -> (CloudService, Arc<RecordingSink>) {
    service_with(config())
}

// ── SimDevice ─────────────────────────────────────────────────

/// Device side of the protocol: keeps its own nonce counter.
pub struct SimDevice {
    pub device_id: &'static str,
    pub secret: &'static str,
    pub nonce: u64,
}

#[allow(dead_code)]
impl SimDevice {
    pub fn new(index: usize) -> Self {
        let (device_id, secret) = DEVICES[index];
        Self {
            device_id,
            secret,
            nonce: 0,
        }
    }

    /// Sign `body` with the next nonce. `device_id` is inserted if absent.
    pub fn envelope(&mut self, mut body: Value) -> Vec<u8> {
        self.nonce += 1;
        if let Value::Object(map) = &mut body {
            map.entry("device_id")
                .or_insert_with(|| Value::from(self.device_id));
        }
        let env = SecureEnvelope::seal(self.secret.as_bytes(), self.nonce, &body).unwrap();
        serde_json::to_vec(&env).unwrap()
    }
}
