//! Blob storage adapters.
//!
//! Implements [`BlobStore`] twice: an in-memory map for tests and
//! memory-only deployments, and a directory backend that keeps each image
//! as one file so chunk reads are plain positioned reads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use log::{info, warn};

use crate::app::ports::BlobStore;
use crate::error::StorageError;

// ───────────────────────────────────────────────────────────────
// In-memory backend
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, location: &str, data: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.to_string(), data.to_vec());
        Ok(())
    }

    fn read_at(&self, location: &str, offset: u64, len: usize) -> Result<Vec<u8>, StorageError> {
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        let blob = blobs.get(location).ok_or(StorageError::NotFound)?;
        let start = usize::try_from(offset).map_err(|_| StorageError::ShortRead)?;
        let end = start.checked_add(len).ok_or(StorageError::ShortRead)?;
        blob.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(StorageError::ShortRead)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ───────────────────────────────────────────────────────────────
// Directory backend
// ───────────────────────────────────────────────────────────────

/// One file per blob under a root directory.
pub struct DirBlobStore {
    root: PathBuf,
}

impl DirBlobStore {
    /// Open (creating if needed) the blob directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            warn!("blob: cannot create {}: {e}", root.display());
            StorageError::Io
        })?;
        info!("blob: directory backend at {}", root.display());
        Ok(Self { root })
    }

    fn path(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

impl BlobStore for DirBlobStore {
    fn put(&self, location: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(location);
        let tmp = path.with_extension("part");

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
            std::fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            warn!("blob: write {} failed: {e}", path.display());
            StorageError::Io
        })
    }

    fn read_at(&self, location: &str, offset: u64, len: usize) -> Result<Vec<u8>, StorageError> {
        let path = self.path(location);
        let mut file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io,
        })?;
        file.seek(SeekFrom::Start(offset)).map_err(|_| StorageError::Io)?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => StorageError::ShortRead,
            _ => StorageError::Io,
        })?;
        Ok(buf)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}
