//! Unified error types for the EcoWatt cloud backend.
//!
//! Every subsystem has a small `Copy` error enum; all of them convert into the
//! crate-level [`Error`] so the HTTP adapter maps failures in one place.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the backend funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The device authentication gate rejected an envelope.
    Auth(AuthError),
    /// A firmware catalog or FOTA session operation failed.
    Fota(FotaError),
    /// The blob backend failed.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// The device exhausted its check-in budget.
    RateLimited,
    /// An operator request named a device that is not registered.
    UnknownDevice,
    /// An operator request was structurally invalid.
    BadRequest(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Fota(e) => write!(f, "fota: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::UnknownDevice => write!(f, "unknown device"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Authentication errors
// ---------------------------------------------------------------------------

/// Reasons the authenticator refuses an envelope.
///
/// These are logged server-side only. Callers must answer every variant with
/// the same response so a client cannot tell which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Outer JSON, base64 payload or inner body could not be decoded.
    MalformedEnvelope,
    /// Identity missing from the body or absent from the registry.
    UnknownDevice,
    /// Nonce is not strictly greater than the last accepted one.
    ReplayDetected,
    /// Tag is not valid hex, has the wrong length, or does not match.
    SignatureInvalid,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEnvelope => write!(f, "malformed envelope"),
            Self::UnknownDevice => write!(f, "unknown device"),
            Self::ReplayDetected => write!(f, "replay detected"),
            Self::SignatureInvalid => write!(f, "signature invalid"),
        }
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

// ---------------------------------------------------------------------------
// Firmware / FOTA errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FotaError {
    /// No artifact with the requested version has been uploaded.
    UnknownFirmware,
    /// A version string was uploaded twice.
    DuplicateVersion,
    /// The device already has a session that has not completed.
    SessionActive,
    /// No session exists for the device.
    SessionNotFound,
    /// The artifact chunk could not be read from the blob store.
    ChunkReadFailure,
    /// Chunk size is zero or larger than the artifact size limit.
    InvalidChunkSize,
    /// Artifact is empty or exceeds the configured maximum.
    InvalidSize,
}

impl fmt::Display for FotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFirmware => write!(f, "unknown firmware version"),
            Self::DuplicateVersion => write!(f, "firmware version already uploaded"),
            Self::SessionActive => write!(f, "an update session is already in progress"),
            Self::SessionNotFound => write!(f, "no update session for device"),
            Self::ChunkReadFailure => write!(f, "failed to read firmware chunk"),
            Self::InvalidChunkSize => write!(f, "chunk size out of range"),
            Self::InvalidSize => write!(f, "firmware size out of range"),
        }
    }
}

impl From<FotaError> for Error {
    fn from(e: FotaError) -> Self {
        Self::Fota(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from [`BlobStore`](crate::app::ports::BlobStore) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested blob does not exist.
    NotFound,
    /// Read returned fewer bytes than requested.
    ShortRead,
    /// Generic I/O error from the backend.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "blob not found"),
            Self::ShortRead => write!(f, "short read"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The configured file path does not exist.
    NotFound,
    /// The file is not valid JSON for [`ServerConfig`](crate::config::ServerConfig).
    Corrupted,
    /// A field failed range validation; the message names the field.
    ValidationFailed(&'static str),
    /// The file exists but could not be read.
    Io,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
