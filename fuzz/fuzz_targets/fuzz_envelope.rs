//! Fuzz target: check-in authentication gate
//!
//! Feeds arbitrary bytes to the check-in engine as a request body.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Nothing is accepted unless it carries a genuine tag for the device
//! - A rejected request never advances the device nonce
//!
//! cargo fuzz run fuzz_envelope

#![no_main]

use std::sync::Arc;

use ecowatt_cloud::CloudService;
use ecowatt_cloud::adapters::blob_store::MemoryBlobStore;
use ecowatt_cloud::adapters::log_sink::LogEventSink;
use ecowatt_cloud::config::{DeviceKey, ServerConfig};
use ecowatt_cloud::rpc::envelope::SecureEnvelope;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let config = ServerConfig {
        devices: vec![DeviceKey {
            device_id: "dev".into(),
            secret: "fuzz-secret".into(),
        }],
        ..ServerConfig::default()
    };
    let svc = CloudService::new(
        config,
        Arc::new(MemoryBlobStore::new()),
        Arc::new(LogEventSink::new()),
    );

    let accepted = svc.check_in(data).is_ok();
    let last_nonce = svc.device_status("dev").map(|s| s.last_nonce).unwrap_or(0);

    if accepted {
        // Only possible if the input is a correctly signed envelope.
        let env = SecureEnvelope::parse(data).expect("accepted input must parse");
        assert!(env.verify_mac(b"fuzz-secret"));
        assert_eq!(last_nonce, env.nonce);
    } else {
        assert_eq!(last_nonce, 0, "rejected input advanced the nonce");
    }
});
