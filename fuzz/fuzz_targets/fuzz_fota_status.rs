//! Fuzz target: `fota_status` acknowledgment decoding
//!
//! Any JSON document must decode to acknowledgments or a typed error, and
//! per-index flags must come out ordered by chunk index.
//!
//! cargo fuzz run fuzz_fota_status

#![no_main]

use ecowatt_cloud::rpc::messages::decode_fota_status;
use ecowatt_cloud::rpc::ota::FotaAck;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Ok(acks) = decode_fota_status(&value) else {
        return;
    };

    let indices: Vec<u32> = acks
        .iter()
        .filter_map(|a| match a {
            FotaAck::Chunk { index, .. } => Some(*index),
            FotaAck::Manifest { .. } => None,
        })
        .collect();

    // A structured ack (if present) precedes the sorted flags.
    let flags = if value.get("chunk_received").is_some() {
        &indices[1..]
    } else {
        &indices[..]
    };
    assert!(flags.windows(2).all(|w| w[0] <= w[1]));
});
