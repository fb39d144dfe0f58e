//! Integration tests for operator commands and cross-device concurrency.

use std::sync::Arc;
use std::thread;

use ecowatt_cloud::app::commands::OperatorCommand;
use ecowatt_cloud::app::events::AppEvent;
use ecowatt_cloud::error::{Error, FotaError};
use ecowatt_cloud::rpc::ota::{FotaOutput, FotaState};
use serde_json::json;

use crate::mock_sink::{SimDevice, service};

#[test]
fn queued_update_starts_with_manifest() {
    let (svc, sink) = service();
    svc.upload_firmware("2.0.0", &[0xA5; 300], Some(128)).unwrap();
    svc.handle_command(OperatorCommand::QueueUpdate {
        device_id: "inv-001".into(),
        version: "2.0.0".into(),
    })
    .unwrap();

    let mut dev = SimDevice::new(0);
    let resp = svc.check_in(&dev.envelope(json!({}))).unwrap();
    match resp.fota {
        Some(FotaOutput::Handshake { manifest, next_chunk }) => {
            assert_eq!(manifest.version, "2.0.0");
            assert_eq!(manifest.total_chunks, 3);
            assert_eq!(next_chunk, 0);
        }
        other => panic!("expected manifest, got {other:?}"),
    }
    assert_eq!(svc.session_status("inv-001").unwrap().state, FotaState::ManifestSent);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::FotaQueued { .. })), 1);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::FotaStateChanged { from: FotaState::Queued, to: FotaState::ManifestSent, .. }
        )),
        1
    );
}

#[test]
fn completed_session_can_be_replaced() {
    let (svc, _sink) = service();
    svc.upload_firmware("1", b"tiny", Some(16)).unwrap();
    svc.upload_firmware("2", b"tinier", Some(16)).unwrap();
    let queue = |version: &str| {
        svc.handle_command(OperatorCommand::QueueUpdate {
            device_id: "inv-001".into(),
            version: version.into(),
        })
    };
    queue("1").unwrap();

    let mut dev = SimDevice::new(0);
    svc.check_in(&dev.envelope(json!({}))).unwrap();
    svc.check_in(&dev.envelope(json!({"fota_status": {"manifest_ack": true}}))).unwrap();
    assert_eq!(queue("2"), Err(Error::Fota(FotaError::SessionActive)));

    svc.check_in(&dev.envelope(json!({"fota_status": {"chunk_received": 0, "verified": true}})))
        .unwrap();
    assert_eq!(svc.session_status("inv-001").unwrap().state, FotaState::Completed);
    queue("2").unwrap();
    assert_eq!(svc.session_status("inv-001").unwrap().version, "2");
}

#[test]
fn duplicate_firmware_version_is_refused() {
    let (svc, _sink) = service();
    svc.upload_firmware("1.0", b"image", None).unwrap();
    assert_eq!(
        svc.upload_firmware("1.0", b"other", None).unwrap_err(),
        Error::Fota(FotaError::DuplicateVersion)
    );
    assert_eq!(svc.health().firmware, 1);
    assert_eq!(svc.health().devices, 2);
}

#[test]
fn devices_progress_in_parallel() {
    let (svc, _sink) = service();
    let svc = Arc::new(svc);

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                let mut dev = SimDevice::new(i);
                for _ in 0..50 {
                    svc.check_in(&dev.envelope(json!({}))).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(svc.device_status("inv-001").unwrap().last_nonce, 50);
    assert_eq!(svc.device_status("inv-002").unwrap().last_nonce, 50);
}

#[test]
fn racing_check_ins_deliver_pending_config_once() {
    let (svc, sink) = service();
    svc.handle_command(OperatorCommand::QueueConfig {
        device_id: "inv-001".into(),
        config: json!({"sampling_rate": 1}),
    })
    .unwrap();
    let svc = Arc::new(svc);

    let mut dev = SimDevice::new(0);
    let requests = [dev.envelope(json!({})), dev.envelope(json!({}))];
    let handles: Vec<_> = requests
        .into_iter()
        .map(|raw| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || svc.check_in(&raw))
        })
        .collect();

    let delivered = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().ok())
        .filter(|resp| resp.config_update.is_some())
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ConfigDelivered { .. })), 1);
}

#[test]
fn racing_chunk_acks_advance_delivery_once() {
    let (svc, sink) = service();
    svc.upload_firmware("3.0.0", &[0x3C; 300], Some(128)).unwrap();
    svc.handle_command(OperatorCommand::QueueUpdate {
        device_id: "inv-001".into(),
        version: "3.0.0".into(),
    })
    .unwrap();

    let mut dev = SimDevice::new(0);
    svc.check_in(&dev.envelope(json!({}))).unwrap();
    svc.check_in(&dev.envelope(json!({"fota_status": {"manifest_ack": true}})))
        .unwrap();
    let status = svc.session_status("inv-001").unwrap();
    assert_eq!(status.state, FotaState::Active);
    assert_eq!(status.current_chunk_index, 0);

    // Two fresh nonces carrying the same acknowledgment for chunk 0.
    let ack = json!({"fota_status": {"chunk_received": 0, "verified": true}});
    let requests = [dev.envelope(ack.clone()), dev.envelope(ack)];
    let svc = Arc::new(svc);
    let handles: Vec<_> = requests
        .into_iter()
        .map(|raw| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || svc.check_in(&raw))
        })
        .collect();
    for h in handles {
        // Whichever lands second may be a replay; neither may double-advance.
        let _ = h.join().unwrap();
    }

    let status = svc.session_status("inv-001").unwrap();
    assert_eq!(status.current_chunk_index, 1);
    assert_eq!(status.last_ack_chunk_index, Some(0));
    assert_eq!(status.retry_chunk_index, None);
    assert_eq!(status.state, FotaState::Active);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ChunkAccepted { index: 0, .. })), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ChunkAccepted { .. })), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ChunkRejected { .. })), 0);
}
