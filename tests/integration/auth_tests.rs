//! Integration tests for the check-in authentication gate.

use ecowatt_cloud::app::events::AppEvent;
use ecowatt_cloud::config::RateLimitConfig;
use ecowatt_cloud::error::{AuthError, Error};
use ecowatt_cloud::rpc::envelope::SecureEnvelope;
use serde_json::json;

use crate::mock_sink::{SimDevice, config, service, service_with};

#[test]
fn signed_check_in_is_accepted() {
    let (svc, sink) = service();
    let mut dev = SimDevice::new(0);
    let resp = svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert!(resp.config_update.is_none() && resp.command.is_none() && resp.fota.is_none());
    assert_eq!(svc.device_status("inv-001").unwrap().last_nonce, 1);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::Authenticated { nonce: 1, .. })),
        1
    );
}

#[test]
fn replayed_envelope_is_rejected_with_valid_signature() {
    let (svc, _sink) = service();
    let mut dev = SimDevice::new(0);
    let raw = dev.envelope(json!({}));
    svc.check_in(&raw).unwrap();
    assert_eq!(svc.check_in(&raw).unwrap_err(), Error::Auth(AuthError::ReplayDetected));
}

#[test]
fn accepted_nonces_strictly_increase() {
    let (svc, _sink) = service();
    let mut dev = SimDevice::new(0);
    dev.nonce = 41;
    svc.check_in(&dev.envelope(json!({}))).unwrap();

    // Rewind the device counter: every older nonce is refused.
    for nonce in [1, 20, 42] {
        dev.nonce = nonce - 1;
        assert_eq!(
            svc.check_in(&dev.envelope(json!({}))).unwrap_err(),
            Error::Auth(AuthError::ReplayDetected)
        );
    }
    dev.nonce = 42;
    svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert_eq!(svc.device_status("inv-001").unwrap().last_nonce, 43);
}

#[test]
fn cross_device_identity_is_rejected() {
    let (svc, _sink) = service();
    // Device 0's key, device 1's identity inside the body.
    let env = SecureEnvelope::seal(b"secret-one", 1, &json!({"device_id": "inv-002"})).unwrap();
    let err = svc.check_in(&serde_json::to_vec(&env).unwrap()).unwrap_err();
    assert_eq!(err, Error::Auth(AuthError::SignatureInvalid));
    assert_eq!(svc.device_status("inv-002").unwrap().last_nonce, 0);
}

#[test]
fn outer_device_id_is_not_trusted() {
    let (svc, _sink) = service();
    // Identity only outside the signed payload.
    let env = SecureEnvelope::seal(b"secret-one", 1, &json!({})).unwrap();
    let mut outer = serde_json::to_value(&env).unwrap();
    outer["device_id"] = json!("inv-001");
    let err = svc.check_in(&serde_json::to_vec(&outer).unwrap()).unwrap_err();
    assert_eq!(err, Error::Auth(AuthError::UnknownDevice));
}

#[test]
fn rejection_reasons_are_recorded() {
    let (svc, sink) = service();
    let _ = svc.check_in(b"not even json");
    let mut stranger = SimDevice::new(0);
    stranger.device_id = "inv-999";
    let _ = svc.check_in(&stranger.envelope(json!({})));

    let reasons: Vec<_> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::AuthRejected { device_id, reason } => Some((device_id, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            (None, AuthError::MalformedEnvelope),
            (Some("inv-999".to_string()), AuthError::UnknownDevice),
        ]
    );
}

#[test]
fn rate_limited_device_still_consumes_nonce() {
    let (svc, sink) = service_with(ecowatt_cloud::config::ServerConfig {
        rate_limit: RateLimitConfig {
            burst: 2,
            per_second: 2,
        },
        ..config()
    });
    let mut dev = SimDevice::new(0);
    svc.check_in(&dev.envelope(json!({}))).unwrap();
    svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert_eq!(svc.check_in(&dev.envelope(json!({}))).unwrap_err(), Error::RateLimited);
    assert_eq!(svc.device_status("inv-001").unwrap().last_nonce, 3);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::RateLimited { .. })), 1);

    // Other devices have their own bucket.
    let mut other = SimDevice::new(1);
    svc.check_in(&other.envelope(json!({}))).unwrap();
}
