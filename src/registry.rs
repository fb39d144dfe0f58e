//! Device registry — the static map of device identity to pre-shared key,
//! plus each device's mutable protocol state.
//!
//! The map is built once from configuration and never changes shape, so
//! lookups need no global lock. Every entry carries its own mutex; holding
//! it serialises everything that happens to one device (nonce, mailboxes,
//! FOTA session, rate limiter) while other devices proceed in parallel.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use burster::Limiter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::adapters::time::monotonic_now;
use crate::config::{DeviceKey, RateLimitConfig};
use crate::queue::PendingWork;
use crate::rpc::ota::{FotaSession, SessionStatus};

/// Mutable per-device state, reachable only through the device's lock.
pub struct DeviceState {
    device_id: String,
    pub(crate) secret: Vec<u8>,
    last_nonce: u64,
    pub pending: PendingWork,
    pub fota: Option<FotaSession>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_config_ack: Option<Value>,
    pub last_command_result: Option<Value>,
    rate_limiter: burster::TokenBucket<fn() -> Duration>,
}

impl DeviceState {
    fn new(key: &DeviceKey, limits: RateLimitConfig) -> Self {
        Self {
            device_id: key.device_id.clone(),
            secret: key.secret.as_bytes().to_vec(),
            last_nonce: 0,
            pending: PendingWork::default(),
            fota: None,
            last_seen: None,
            last_config_ack: None,
            last_command_result: None,
            rate_limiter: burster::TokenBucket::new_with_time_provider(
                limits.per_second,
                limits.burst,
                monotonic_now as fn() -> Duration,
            ),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Highest nonce accepted so far (0 before the first check-in).
    pub fn last_nonce(&self) -> u64 {
        self.last_nonce
    }

    /// Record `nonce` as accepted. Only the authenticator calls this, after
    /// the tag has verified.
    pub(crate) fn accept_nonce(&mut self, nonce: u64) {
        debug_assert!(nonce > self.last_nonce);
        self.last_nonce = nonce;
    }

    /// Consume one rate-limit token; returns `false` when exhausted.
    pub fn check_rate_limit(&mut self) -> bool {
        self.rate_limiter.try_consume(1).is_ok()
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            device_id: self.device_id.clone(),
            last_nonce: self.last_nonce,
            last_seen: self.last_seen,
            config_pending: self.pending.config.is_pending(),
            command_pending: self.pending.command.is_pending(),
            last_config_ack: self.last_config_ack.clone(),
            last_command_result: self.last_command_result.clone(),
            fota: self.fota.as_ref().map(FotaSession::status),
        }
    }
}

/// Operator view of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device_id: String,
    pub last_nonce: u64,
    pub last_seen: Option<DateTime<Utc>>,
    pub config_pending: bool,
    pub command_pending: bool,
    pub last_config_ack: Option<Value>,
    pub last_command_result: Option<Value>,
    pub fota: Option<SessionStatus>,
}

/// Fixed table of registered devices.
pub struct DeviceRegistry {
    devices: HashMap<String, Mutex<DeviceState>>,
}

impl DeviceRegistry {
    pub fn new(keys: &[DeviceKey], limits: RateLimitConfig) -> Self {
        let devices = keys
            .iter()
            .map(|key| (key.device_id.clone(), Mutex::new(DeviceState::new(key, limits))))
            .collect();
        Self { devices }
    }

    /// Lock one device's state. `None` for unregistered identities.
    pub fn lock(&self, device_id: &str) -> Option<MutexGuard<'_, DeviceState>> {
        self.devices
            .get(device_id)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
