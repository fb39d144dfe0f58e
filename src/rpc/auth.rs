//! Device authentication gate — nonce + HMAC-SHA256 over every envelope.
//!
//! Checks run in a fixed order and nothing is mutated until all pass:
//!
//! 1. Decode the payload and read `device_id` from *inside* the body
//! 2. Reject nonces not strictly greater than the last accepted one
//! 3. Verify `HMAC-SHA256(secret, "{nonce}.{payload}")` in constant time
//! 4. Record the nonce, then hand out the body together with the device lock
//!
//! The device lock taken in step 1 is returned to the caller inside
//! [`Authenticated`], so nothing else can touch the device between the
//! nonce update and the processing of the body.

use std::sync::{Arc, MutexGuard};

use log::warn;

use crate::error::AuthError;
use crate::registry::{DeviceRegistry, DeviceState};

use super::envelope::SecureEnvelope;
use super::messages::CheckInBody;

/// A verified envelope: the trusted body and the still-held device lock.
pub struct Authenticated<'a> {
    pub device: MutexGuard<'a, DeviceState>,
    pub body: CheckInBody,
    pub nonce: u64,
}

/// Why an envelope was refused, and which device it claimed to be from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub device_id: Option<String>,
    pub reason: AuthError,
}

impl Rejection {
    fn new(device_id: Option<&str>, reason: AuthError) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            reason,
        }
    }
}

impl From<AuthError> for Rejection {
    fn from(reason: AuthError) -> Self {
        Self {
            device_id: None,
            reason,
        }
    }
}

pub struct Authenticator {
    registry: Arc<DeviceRegistry>,
}

impl Authenticator {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Validate `envelope` and return the trusted body.
    pub fn validate(&self, envelope: &SecureEnvelope) -> Result<Authenticated<'_>, Rejection> {
        let raw = envelope.decode_payload()?;
        let body: CheckInBody =
            serde_json::from_slice(&raw).map_err(|_| AuthError::MalformedEnvelope)?;

        let Some(device_id) = body.device_id.as_deref() else {
            return Err(AuthError::UnknownDevice.into());
        };
        let Some(mut device) = self.registry.lock(device_id) else {
            return Err(Rejection::new(Some(device_id), AuthError::UnknownDevice));
        };

        if envelope.nonce <= device.last_nonce() {
            warn!(
                "auth: {} nonce regression (got {}, last {})",
                device_id,
                envelope.nonce,
                device.last_nonce()
            );
            return Err(Rejection::new(Some(device_id), AuthError::ReplayDetected));
        }

        if !envelope.verify_mac(&device.secret) {
            warn!("auth: {} HMAC verification failed", device_id);
            return Err(Rejection::new(Some(device_id), AuthError::SignatureInvalid));
        }

        device.accept_nonce(envelope.nonce);
        Ok(Authenticated {
            device,
            body,
            nonce: envelope.nonce,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
