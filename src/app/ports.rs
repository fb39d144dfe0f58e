//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CloudService / CheckInEngine (domain)
//! ```
//!
//! Driven adapters (blob storage, event sinks) implement these traits. The
//! domain holds them as `Arc<dyn _>` so handlers running on different tokio
//! workers share one backend.
//!
//! ## Notes
//!
//! - **BlobStore** writes must be complete before `put` returns; a session may
//!   start reading chunks immediately after the artifact is catalogued.
//! - **EventSink** implementations must not block; they run while a device
//!   lock is held.

use crate::error::StorageError;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Blob storage port (driven adapter: domain ↔ firmware bytes)
// ───────────────────────────────────────────────────────────────

/// Storage for immutable firmware images, addressed by an opaque location.
pub trait BlobStore: Send + Sync {
    /// Persist `data` under `location`, replacing nothing: locations are
    /// unique per artifact.
    fn put(&self, location: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// A read that returns fewer bytes is reported as
    /// [`StorageError::ShortRead`].
    fn read_at(&self, location: &str, offset: u64, len: usize) -> Result<Vec<u8>, StorageError>;

    /// Human-readable backend name for startup logs.
    fn describe(&self) -> String;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port. Adapters
/// decide where they go (log records, an audit stream, a test recorder).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AppEvent);
}
