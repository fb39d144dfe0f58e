//! Telemetry ingestion — compression reports uploaded by devices.
//!
//! Devices delta-encode each field's samples as scaled integers. On upload
//! every field's `payload` is reconstructed into `decompressed_payload`
//! (running sum) and `original_values` (`value / 10^scale`). Records are
//! kept in a bounded in-memory ring; the oldest fall off first.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::adapters::time::timestamp;
use crate::config::TelemetryConfig;
use crate::error::{Error, Result};

/// Reports returned by [`TelemetryLedger::latest`] by default.
pub const LATEST_REPORTS: usize = 10;

/// Fields reported in thousandths.
const MILLI_SCALED_FIELDS: [&str; 3] = ["AC_VOLTAGE", "AC_CURRENT", "AC_FREQUENCY"];

// ── Decoding ─────────────────────────────────────────────────

/// Invert device-side delta encoding: `out[0] = d[0]`, `out[i] = out[i-1] + d[i]`.
///
/// Returns `None` if the running sum overflows.
pub fn delta_decode(deltas: &[i64]) -> Option<Vec<i64>> {
    let mut out = Vec::with_capacity(deltas.len());
    let mut acc: i64 = 0;
    for (i, &d) in deltas.iter().enumerate() {
        acc = if i == 0 { d } else { acc.checked_add(d)? };
        out.push(acc);
    }
    Some(out)
}

/// Decimal scale a field was encoded with.
pub fn scale_for(field: &str) -> i32 {
    if MILLI_SCALED_FIELDS.contains(&field) { 3 } else { 0 }
}

pub fn scale_back(value: i64, scale: i32) -> f64 {
    value as f64 / 10f64.powi(scale)
}

/// Decode every field of a report in place. Returns whether the report
/// carried a `fields` object at all.
pub fn decompress_report(report: &mut Map<String, Value>) -> Result<bool> {
    let Some(fields) = report.get_mut("fields") else {
        return Ok(false);
    };
    let fields = fields
        .as_object_mut()
        .ok_or(Error::BadRequest("fields must be an object"))?;

    for (name, field) in fields.iter_mut() {
        let Some(field) = field.as_object_mut() else {
            continue;
        };
        let deltas = match field.get("payload") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(Value::as_i64)
                .collect::<Option<Vec<i64>>>()
                .ok_or(Error::BadRequest("payload must hold integers"))?,
            _ => continue,
        };
        let decoded =
            delta_decode(&deltas).ok_or(Error::BadRequest("payload overflows when decoded"))?;
        let scale = scale_for(name);
        let original: Vec<f64> = decoded.iter().map(|&v| scale_back(v, scale)).collect();

        field.insert("decompressed_payload".into(), Value::from(decoded));
        field.insert("original_values".into(), Value::from(original));
    }
    Ok(true)
}

// ── Ledger ───────────────────────────────────────────────────

/// One stored upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 UTC.
    pub received_at: String,
    pub device_data: Value,
}

/// Upload interval and sampling rate advertised back to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextConfig {
    pub upload_interval: u32,
    pub sampling_rate: u32,
}

/// Response to a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub status: &'static str,
    /// Echo of the stored record's `received_at`.
    pub ack_time: String,
    pub next_config: NextConfig,
    pub decompression_status: &'static str,
}

/// Response of the latest-reports query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestReports {
    pub status: &'static str,
    pub data: Vec<Value>,
    pub total_reports: u64,
}

#[derive(Default)]
struct Ledger {
    records: VecDeque<TelemetryRecord>,
    reports: VecDeque<Value>,
    total_reports: u64,
}

/// Bounded store of uploads and the compression reports among them.
pub struct TelemetryLedger {
    config: TelemetryConfig,
    inner: Mutex<Ledger>,
}

impl TelemetryLedger {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Ledger::default()),
        }
    }

    /// Decode and store one upload.
    ///
    /// Anything but a non-empty JSON object is rejected as invalid JSON.
    pub fn record(&self, payload: Value) -> Result<UploadReceipt> {
        let Value::Object(mut report) = payload else {
            return Err(Error::BadRequest("Invalid JSON"));
        };
        if report.is_empty() {
            return Err(Error::BadRequest("Invalid JSON"));
        }

        let has_fields = decompress_report(&mut report)?;
        let device_data = Value::Object(report);
        let received_at = timestamp();

        let mut ledger = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if has_fields {
            push_bounded(&mut ledger.reports, device_data.clone(), self.config.capacity);
            ledger.total_reports += 1;
        }
        push_bounded(
            &mut ledger.records,
            TelemetryRecord {
                received_at: received_at.clone(),
                device_data,
            },
            self.config.capacity,
        );

        Ok(UploadReceipt {
            status: "ok",
            ack_time: received_at,
            next_config: NextConfig {
                upload_interval: self.config.upload_interval_min,
                sampling_rate: self.config.sampling_rate_secs,
            },
            decompression_status: if has_fields { "success" } else { "no_compression_data" },
        })
    }

    /// Every retained upload, oldest first.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        let ledger = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.records.iter().cloned().collect()
    }

    /// Every retained compression report, oldest first.
    pub fn reports(&self) -> Vec<Value> {
        let ledger = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.reports.iter().cloned().collect()
    }

    /// The newest `n` reports, plus the count of all reports ever received.
    pub fn latest(&self, n: usize) -> LatestReports {
        let ledger = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = ledger.reports.len().saturating_sub(n);
        let data: Vec<Value> = ledger.reports.iter().skip(skip).cloned().collect();
        LatestReports {
            status: if data.is_empty() { "no_data" } else { "success" },
            data,
            total_reports: ledger.total_reports,
        }
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    while ring.len() >= capacity.max(1) {
        ring.pop_front();
    }
    ring.push_back(item);
}
