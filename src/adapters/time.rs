//! Time sources.
//!
//! - [`utc_now`] / [`timestamp`] — wall-clock time for records shown to
//!   operators and devices.
//! - [`monotonic_now`] — process-relative monotonic time, the clock behind
//!   the per-device rate limiters.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn timestamp() -> String {
    utc_now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Time elapsed since the first call in this process.
pub fn monotonic_now() -> Duration {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
