//! Adapters — concrete implementations of the hexagonal port traits, plus
//! the HTTP surface that drives the core.
//!
//! | Adapter      | Implements | Connects to                     |
//! |--------------|------------|---------------------------------|
//! | `blob_store` | BlobStore  | process memory / local directory|
//! | `http`       | (driver)   | axum router over `CloudService` |
//! | `log_sink`   | EventSink  | `log` facade                    |
//! | `time`       | (clocks)   | system wall clock, `Instant`    |

pub mod blob_store;
pub mod http;
pub mod log_sink;
pub mod time;
