//! Integration tests for the single-slot config and command mailboxes.

use ecowatt_cloud::app::commands::OperatorCommand;
use ecowatt_cloud::app::events::AppEvent;
use serde_json::json;

use crate::mock_sink::{SimDevice, service};

fn queue_config(svc: &ecowatt_cloud::CloudService, config: serde_json::Value) {
    svc.handle_command(OperatorCommand::QueueConfig {
        device_id: "inv-001".into(),
        config,
    })
    .unwrap();
}

#[test]
fn newer_config_overwrites_undelivered_one() {
    let (svc, _sink) = service();
    queue_config(&svc, json!({"sampling_rate": 5}));
    queue_config(&svc, json!({"sampling_rate": 10}));

    let mut dev = SimDevice::new(0);
    let resp = svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert_eq!(resp.config_update, Some(json!({"sampling_rate": 10})));

    let resp = svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert_eq!(resp.config_update, None);
}

#[test]
fn config_and_command_travel_together() {
    let (svc, sink) = service();
    queue_config(&svc, json!({"upload_interval": 30}));
    svc.handle_command(OperatorCommand::QueueCommand {
        device_id: "inv-001".into(),
        command: json!({"action": "write_register", "value": 50}),
    })
    .unwrap();

    let mut dev = SimDevice::new(0);
    let resp = svc.check_in(&dev.envelope(json!({}))).unwrap();
    assert!(resp.config_update.is_some());
    assert_eq!(resp.command, Some(json!({"action": "write_register", "value": 50})));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ConfigDelivered { .. })), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandDelivered { .. })), 1);
}

#[test]
fn mailboxes_are_per_device() {
    let (svc, _sink) = service();
    queue_config(&svc, json!({"x": 1}));

    let mut other = SimDevice::new(1);
    assert!(svc.check_in(&other.envelope(json!({}))).unwrap().config_update.is_none());
    assert!(svc.device_status("inv-001").unwrap().config_pending);
}

#[test]
fn failed_check_in_leaves_mailbox_intact() {
    let (svc, _sink) = service();
    queue_config(&svc, json!({"x": 1}));

    let mut dev = SimDevice::new(0);
    let raw = dev.envelope(json!({}));
    let mut tampered: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    tampered["nonce"] = json!(99);
    assert!(svc.check_in(&serde_json::to_vec(&tampered).unwrap()).is_err());
    assert!(svc.device_status("inv-001").unwrap().config_pending);

    let resp = svc.check_in(&raw).unwrap();
    assert_eq!(resp.config_update, Some(json!({"x": 1})));
}

#[test]
fn device_acknowledgments_are_recorded() {
    let (svc, sink) = service();
    let mut dev = SimDevice::new(0);
    svc.check_in(&dev.envelope(json!({
        "config_ack": {"applied": true},
        "command_result": {"status": "ok", "value": 50}
    })))
    .unwrap();

    let status = svc.device_status("inv-001").unwrap();
    assert_eq!(status.last_config_ack, Some(json!({"applied": true})));
    assert_eq!(status.last_command_result, Some(json!({"status": "ok", "value": 50})));
    assert!(status.last_seen.is_some());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ConfigAcknowledged { .. })), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandResult { .. })), 1);
}
