//! Blob store boundary: opaque binary objects addressed by (bucket, key).
//!
//! The document orchestrator only sees the [`BlobStore`] trait, so the
//! backend can be swapped (remote object storage, in-memory test double)
//! without touching lifecycle logic. [`FsBlobStore`] is the default
//! backend: payloads on local disk, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_BLOB_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("permission denied for bucket `{0}`")]
    PermissionDenied(String),
    #[error("invalid blob key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Remote-style blob storage: put/get/delete by bucket and key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob. Overwrites any existing blob under the same key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        payload: Bytes,
    ) -> BlobResult<()>;

    /// Read a blob fully into memory.
    async fn get(&self, bucket: &str, key: &str) -> BlobResult<Bytes>;

    /// Delete a blob. An already-absent blob counts as success, so
    /// deletes are idempotent.
    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()>;
}

/// Local-disk blob store with the same contract as a remote one.
#[derive(Clone)]
pub struct FsBlobStore {
    /// Base directory on disk where blob payloads are stored.
    pub base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized keys, keys beginning with `/`, and keys
    /// containing `..`, NUL, or backslash.
    fn ensure_key_safe(key: &str) -> BlobResult<()> {
        if key.is_empty() || key.len() > MAX_BLOB_KEY_LEN {
            return Err(BlobError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(BlobError::InvalidKey);
        }
        if key.bytes().any(|b| b == b'\\' || b == b'\0') {
            return Err(BlobError::InvalidKey);
        }
        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Two-level shard identifiers for a key: first two bytes of
    /// MD5(bucket/key) as lowercase hex. Keeps per-directory file counts
    /// small.
    fn shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(bucket, key);
        let mut path = self.bucket_root(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Map an I/O failure to the adapter's error taxonomy.
    fn classify_io(bucket: &str, err: io::Error) -> BlobError {
        if err.kind() == ErrorKind::PermissionDenied {
            BlobError::PermissionDenied(bucket.to_string())
        } else {
            BlobError::Io(err)
        }
    }

    /// Remove now-empty shard directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
        payload: Bytes,
    ) -> BlobResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or(BlobError::InvalidKey)?;
        fs::create_dir_all(&parent)
            .await
            .map_err(|err| Self::classify_io(bucket, err))?;

        // Write through a temp file, fsync, then rename so a crash never
        // leaves a half-written blob at the final key.
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path)
            .await
            .map_err(|err| Self::classify_io(bucket, err))?;

        if let Err(err) = file.write_all(&payload).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Self::classify_io(bucket, err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Self::classify_io(bucket, err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(Self::classify_io(bucket, err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(Self::classify_io(bucket, err));
            }
        }

        debug!("stored blob {} ({} bytes)", file_path.display(), payload.len());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> BlobResult<Bytes> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(bucket, key);
        let data = fs::read(&file_path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => BlobError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => Self::classify_io(bucket, err),
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, bucket: &str, key: &str) -> BlobResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.blob_path(bucket, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", file_path.display());
            }
            Err(err) => return Err(Self::classify_io(bucket, err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(())
    }
}
