//! Firmware catalog — immutable artifacts available for delivery.
//!
//! An artifact is created once per uploaded image. Its bytes live in a
//! [`BlobStore`]; the catalog keeps only the metadata every session needs
//! (size, content hash, chunk geometry). Many sessions may share one
//! artifact through an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::info;
use serde::Serialize;

use crate::app::ports::BlobStore;
use crate::error::{Error, FotaError, Result};

/// Metadata snapshot sent to a device before chunk delivery starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub version: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the whole image.
    pub hash: String,
    pub chunk_size: u32,
    pub total_chunks: u32,
}

/// One uploaded firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareArtifact {
    pub version: String,
    pub blob_location: String,
    pub size: u64,
    pub content_hash: String,
    pub chunk_size: u32,
    pub total_chunks: u32,
}

impl FirmwareArtifact {
    /// Derive the artifact metadata for `data`.
    ///
    /// Fails on an empty image, an image above `max_size`, or a chunk size
    /// of zero.
    pub fn describe(version: &str, data: &[u8], chunk_size: u32, max_size: u64) -> Result<Self> {
        let size = data.len() as u64;
        if size == 0 || size > max_size {
            return Err(FotaError::InvalidSize.into());
        }
        if chunk_size == 0 || u64::from(chunk_size) > max_size {
            return Err(FotaError::InvalidChunkSize.into());
        }

        let content_hash = hex::encode(hmac_sha256::Hash::hash(data));
        Ok(Self {
            version: version.to_string(),
            blob_location: blob_location(version, &content_hash),
            size,
            content_hash,
            chunk_size,
            total_chunks: total_chunks(size, chunk_size),
        })
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            version: self.version.clone(),
            size: self.size,
            hash: self.content_hash.clone(),
            chunk_size: self.chunk_size,
            total_chunks: self.total_chunks,
        }
    }

    /// Byte offset and length of chunk `index`, or `None` past the end.
    ///
    /// Every chunk is `chunk_size` bytes except the last, which holds the
    /// remainder.
    pub fn chunk_span(&self, index: u32) -> Option<(u64, usize)> {
        if index >= self.total_chunks {
            return None;
        }
        let offset = u64::from(index) * u64::from(self.chunk_size);
        let len = (self.size - offset).min(u64::from(self.chunk_size));
        Some((offset, len as usize))
    }
}

/// `ceil(size / chunk_size)`.
pub fn total_chunks(size: u64, chunk_size: u32) -> u32 {
    size.div_ceil(u64::from(chunk_size)) as u32
}

/// Sanitised version plus a hash prefix, so distinct images never share a
/// location even when their versions sanitise to the same string.
fn blob_location(version: &str, content_hash: &str) -> String {
    let safe: String = version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }
        })
        .collect();
    let tag = content_hash.get(..16).unwrap_or(content_hash);
    format!("firmware-{safe}-{tag}.bin")
}

// ───────────────────────────────────────────────────────────────
// Catalog
// ───────────────────────────────────────────────────────────────

/// Versioned catalog of artifacts backed by a blob store.
pub struct FirmwareStore {
    blobs: Arc<dyn BlobStore>,
    artifacts: RwLock<HashMap<String, Arc<FirmwareArtifact>>>,
    max_size: u64,
}

impl FirmwareStore {
    pub fn new(blobs: Arc<dyn BlobStore>, max_size: u64) -> Self {
        Self {
            blobs,
            artifacts: RwLock::new(HashMap::new()),
            max_size,
        }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Store a new image. Versions are write-once.
    ///
    /// The blob is written before the catalog lock is taken, so lookups never
    /// wait on storage. A concurrent upload of the same version that wins the
    /// insert leaves this call's blob unreferenced.
    pub fn upload(
        &self,
        version: &str,
        data: &[u8],
        chunk_size: u32,
    ) -> Result<Arc<FirmwareArtifact>> {
        if version.trim().is_empty() {
            return Err(Error::BadRequest("version must not be empty"));
        }
        let artifact = FirmwareArtifact::describe(version, data, chunk_size, self.max_size)?;
        if self.get(version).is_some() {
            return Err(FotaError::DuplicateVersion.into());
        }
        self.blobs.put(&artifact.blob_location, data)?;

        let mut artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
        if artifacts.contains_key(version) {
            return Err(FotaError::DuplicateVersion.into());
        }
        let artifact = Arc::new(artifact);
        artifacts.insert(version.to_string(), Arc::clone(&artifact));
        info!(
            "firmware: stored {} ({} bytes, {} chunks of {})",
            artifact.version, artifact.size, artifact.total_chunks, artifact.chunk_size
        );
        Ok(artifact)
    }

    pub fn get(&self, version: &str) -> Option<Arc<FirmwareArtifact>> {
        self.artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(version)
            .cloned()
    }

    /// All manifests, sorted by version string.
    pub fn manifests(&self) -> Vec<Manifest> {
        let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        let mut list: Vec<Manifest> = artifacts.values().map(|a| a.manifest()).collect();
        list.sort_by(|a, b| a.version.cmp(&b.version));
        list
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
