//! Blob storage collaborator for uploaded materials.
//!
//! Storage mechanics are external to the room core: the gateway only needs
//! to store bytes when a file arrives and release them when the teacher
//! deletes the material. The trait keeps the core testable without a
//! filesystem.


use crate::utils;
use async_trait::async_trait;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};

/// Where a stored blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Storage-internal location, used later for release.
    pub path: String,
    /// URL clients fetch the blob from.
    pub url: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> io::Result<StoredBlob>;
    async fn remove(&self, path: &str) -> io::Result<()>;
}

/// Filesystem store: unique suffixed filenames under one upload directory,
/// served back under `/uploads/`.
pub struct FsBlobStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        FsBlobStore {
            dir: dir.into(),
            max_bytes,
        }
    }

    fn unique_filename(original_name: &str) -> String {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let suffix: u32 = rand::rng().random();
        format!("file-{}-{}{}", utils::now_millis(), suffix, extension)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> io::Result<StoredBlob> {
        if bytes.len() > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file exceeds the {} byte upload limit", self.max_bytes),
            ));
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = Self::unique_filename(original_name);
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredBlob {
            path: path.to_string_lossy().into_owned(),
            url: format!("/uploads/{}", filename),
            size: bytes.len() as u64,
        })
    }

    async fn remove(&self, path: &str) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Store that keeps nothing; for link-only deployments and tests.
#[derive(Debug, Default)]
pub struct NullBlobStore;

#[async_trait]
impl BlobStore for NullBlobStore {
    async fn store(&self, original_name: &str, bytes: &[u8]) -> io::Result<StoredBlob> {
        Ok(StoredBlob {
            path: format!("null/{}", original_name),
            url: format!("/uploads/{}", original_name),
            size: bytes.len() as u64,
        })
    }

    async fn remove(&self, _path: &str) -> io::Result<()> {
        Ok(())
    }
}
