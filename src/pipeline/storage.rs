//! # Working Storage
//!
//! On-disk area shared by the pipeline stages and the external tools.
//!
//! Layout under the upload directory:
//!
//! ```text
//! uploads/
//! ├── .<request-id>-XXXXXX/                    # private, removed when the request ends
//! │   ├── custom-env                           # plaintext env file
//! │   └── custom-env-secret.yaml               # plaintext Secret manifest
//! └── <request-id>-custom-env-secret-sealed.yaml  # sealed manifest, kept for download
//! ```
//!
//! Every path embeds the request id, so concurrent submissions never touch the
//! same files.

use crate::constants::SEALED_FILE_SUFFIX;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::warn;
use uuid::Uuid;

/// Unique identifier of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

/// Root of the working storage area
#[derive(Debug, Clone)]
pub struct WorkingStorage {
    root: PathBuf,
}

impl WorkingStorage {
    /// Open the storage area, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the private working directory of a request
    pub fn create_work_dir(&self, request_id: RequestId) -> io::Result<WorkDir> {
        let dir = tempfile::Builder::new()
            .prefix(&format!(".{request_id}-"))
            .tempdir_in(&self.root)?;
        Ok(WorkDir { dir })
    }

    /// File name of the sealed manifest for a request
    pub fn sealed_file_name(request_id: RequestId, secret_name: &str) -> String {
        format!("{request_id}-{secret_name}{SEALED_FILE_SUFFIX}")
    }

    /// Full path of the sealed manifest for a request
    pub fn sealed_path(&self, request_id: RequestId, secret_name: &str) -> PathBuf {
        self.root
            .join(Self::sealed_file_name(request_id, secret_name))
    }

    /// Write a sealed manifest and return its path
    pub async fn persist_sealed(
        &self,
        request_id: RequestId,
        secret_name: &str,
        yaml: &str,
    ) -> io::Result<PathBuf> {
        let path = self.sealed_path(request_id, secret_name);
        tokio::fs::write(&path, yaml).await?;
        Ok(path)
    }

    /// Resolve a download request to a persisted sealed manifest
    ///
    /// Only bare file names with the sealed suffix are accepted, so a download
    /// can never reach plaintext artifacts or escape the storage root.
    pub fn resolve_download(&self, file_name: &str) -> Option<PathBuf> {
        let is_plain_name = !file_name.is_empty()
            && !file_name.starts_with('.')
            && !file_name.contains(['/', '\\'])
            && file_name.ends_with(SEALED_FILE_SUFFIX);
        if !is_plain_name {
            return None;
        }

        let path = self.root.join(file_name);
        path.is_file().then_some(path)
    }
}

/// Private working directory of one request
///
/// Holds the plaintext artifacts; the directory and everything in it is
/// deleted when this value is dropped or [`WorkDir::close`] is called.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the working directory
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory, logging instead of failing if removal does not succeed
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove working directory {}: {}", path.display(), e);
        }
    }
}
