//! Remote object storage used to stage CSV and template files locally.

pub mod gcs;

pub use gcs::GcsStorage;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object {object} not found in bucket {bucket}")]
    NotFound { bucket: String, object: String },
    #[error("download of {object} failed with status {status}")]
    Request { object: String, status: u16 },
    #[error("storage transport failed: {0}")]
    Transport(String),
    #[error("unable to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage runtime unavailable: {0}")]
    Runtime(String),
}

pub trait ObjectStorage: Debug {
    /// Copies `remote_path` of `bucket` to `destination`.
    fn download(&self, bucket: &str, remote_path: &str, destination: &Path)
        -> Result<(), StorageError>;
}

/// Temporary directory holding downloaded inputs; removed on drop.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn new() -> Result<Self, StorageError> {
        let dir = tempfile::Builder::new()
            .prefix("kcsync-")
            .tempdir()
            .map_err(|source| StorageError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Downloads `name` (relative to `prefix` inside the bucket) and returns
    /// the local copy.
    pub fn fetch(
        &self,
        storage: &dyn ObjectStorage,
        bucket: &str,
        prefix: Option<&str>,
        name: &str,
    ) -> Result<PathBuf, StorageError> {
        let remote_path = remote_path(prefix, name);
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let destination = self.dir.path().join(file_name);

        storage.download(bucket, &remote_path, &destination)?;
        info!(bucket, object = %remote_path, "staged remote file");
        Ok(destination)
    }
}

fn remote_path(prefix: Option<&str>, name: &str) -> String {
    match prefix.map(|prefix| prefix.trim_matches('/')) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}/{}", name.trim_start_matches('/')),
        _ => name.trim_start_matches('/').to_string(),
    }
}
