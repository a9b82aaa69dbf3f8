//! Temporary solver files for one task invocation.
//!
//! Every file written or read through the store is recorded under its
//! basename so the task can hand the contents to the audit sink. Files the
//! store created are removed on [`ArtifactStore::cleanup_all`] or on drop,
//! unless the store was told to keep them.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use allot_core::{AllotError, AllotResult};

#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    created: Vec<PathBuf>,
    artifacts: BTreeMap<String, String>,
    keep_files: bool,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: Vec::new(),
            artifacts: BTreeMap::new(),
            keep_files: false,
        }
    }

    /// Leave files on disk after the store is dropped.
    pub fn keep_files(mut self, keep: bool) -> Self {
        self.keep_files = keep;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a uniquely named file holding `content` and record it.
    pub fn write(&mut self, prefix: &str, suffix: &str, content: &str) -> AllotResult<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| AllotError::artifact(&self.dir, format!("failed to create temp file: {e}")))?;

        file.write_all(content.as_bytes())
            .map_err(|e| AllotError::artifact(file.path(), format!("failed to write: {e}")))?;

        let (_, path) = file
            .keep()
            .map_err(|e| AllotError::artifact(&self.dir, format!("failed to persist temp file: {e}")))?;

        debug!(path = %path.display(), bytes = content.len(), "artifact written");
        self.created.push(path.clone());
        self.record(&path, content.to_string());
        Ok(path)
    }

    /// Reserve a unique path for the solver to write to. Nothing is left on
    /// disk at that path.
    pub fn reserve_solution_path(&mut self, prefix: &str) -> AllotResult<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".sol")
            .rand_bytes(12)
            .tempfile_in(&self.dir)
            .map_err(|e| AllotError::artifact(&self.dir, format!("failed to reserve solution path: {e}")))?;

        let path = file.path().to_path_buf();
        file.close()
            .map_err(|e| AllotError::artifact(&path, format!("failed to release reservation: {e}")))?;

        self.created.push(path.clone());
        Ok(path)
    }

    /// Fail unless `path` exists and is non-empty, then flush it to disk.
    ///
    /// The solver may exit before its output buffers reach the filesystem.
    pub fn ensure_readable(&self, path: &Path) -> AllotResult<()> {
        let metadata = fs::metadata(path)
            .map_err(|e| AllotError::artifact(path, format!("missing: {e}")))?;
        if metadata.len() == 0 {
            return Err(AllotError::artifact(path, "empty"));
        }

        File::open(path)
            .and_then(|f| f.sync_all())
            .map_err(|e| AllotError::artifact(path, format!("failed to sync: {e}")))?;
        Ok(())
    }

    /// Read a solver-written file and record its content.
    pub fn read(&mut self, path: &Path) -> AllotResult<String> {
        self.ensure_readable(path)?;
        let content = fs::read_to_string(path)
            .map_err(|e| AllotError::artifact(path, format!("unreadable: {e}")))?;
        self.record(path, content.clone());
        Ok(content)
    }

    /// Best-effort removal; never fails.
    pub fn cleanup(&mut self, paths: &[PathBuf]) {
        for path in paths {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "artifact removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "failed to remove artifact"),
            }
        }
        self.created.retain(|p| !paths.contains(p));
    }

    /// Remove every file this store created.
    pub fn cleanup_all(&mut self) {
        let created = std::mem::take(&mut self.created);
        self.cleanup(&created);
    }

    /// Captured contents keyed by file basename.
    pub fn artifacts(&self) -> &BTreeMap<String, String> {
        &self.artifacts
    }

    /// SHA-256 hex digest of every captured artifact.
    pub fn digests(&self) -> BTreeMap<String, String> {
        self.artifacts
            .iter()
            .map(|(name, content)| (name.clone(), hex::encode(Sha256::digest(content.as_bytes()))))
            .collect()
    }

    fn record(&mut self, path: &Path, content: String) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.artifacts.insert(name, content);
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        if !self.keep_files {
            self.cleanup_all();
        }
    }
}
