//! Filesystem artifact store

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{is_plain_file_name, ArtifactName, ARTIFACT_EXTENSION};
use crate::error::{PipelineError, Result};
use crate::training::ModelKind;

const STAGING_PREFIX: &str = ".staging-";

/// Destination for artifacts produced while fitting
pub trait ArtifactWriter {
    fn save<T: Serialize>(&mut self, name: ArtifactName, value: &T) -> Result<()>;
}

/// Listing entry for one artifact file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub file_name: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Key to blob mapping over a single artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl ArtifactStore {
    /// Store over `root` with a private lock. Does not touch the filesystem.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::with_lock(root, Arc::new(RwLock::new(())))
    }

    /// Store over `root` sharing `lock` with every other handle to the same directory
    pub fn with_lock(root: impl Into<PathBuf>, lock: Arc<RwLock<()>>) -> Self {
        Self {
            root: root.into(),
            lock,
        }
    }

    /// Create the directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| PipelineError::io(&self.root, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: ArtifactName) -> PathBuf {
        self.root.join(name.file_name())
    }

    pub fn exists(&self, name: ArtifactName) -> bool {
        self.path_of(name).is_file()
    }

    /// Path of the model artifact called `model_name`
    pub fn model_path(&self, model_name: &str) -> Result<PathBuf> {
        if !is_plain_file_name(model_name) {
            return Err(PipelineError::invalid_parameter(
                "model_name",
                model_name,
                "must be a plain name without path separators",
            ));
        }
        Ok(self
            .root
            .join(format!("{}.{}", model_name, ARTIFACT_EXTENSION)))
    }

    pub fn load<T: DeserializeOwned>(&self, name: ArtifactName) -> Result<T> {
        load_json(&self.path_of(name))
    }

    /// Raw bytes of one artifact, for download
    pub fn read_bytes(&self, file_name: &str) -> Result<Vec<u8>> {
        if !is_plain_file_name(file_name) {
            return Err(PipelineError::invalid_parameter(
                "file_name",
                file_name,
                "must be a plain file name",
            ));
        }
        let path = self.root.join(file_name);
        let _guard = self.lock.read();
        fs::read(&path).map_err(|e| not_found_or_io(&path, e))
    }

    /// Artifacts currently committed, sorted by file name.
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<ArtifactInfo>> {
        let _guard = self.lock.read();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::io(&self.root, e)),
        };

        let mut infos = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(&self.root, e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !is_plain_file_name(&file_name)
                || !file_name.ends_with(&format!(".{}", ARTIFACT_EXTENSION))
            {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|e| PipelineError::io(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            infos.push(ArtifactInfo {
                file_name,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        infos.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(infos)
    }

    /// Shared guard held while a consistent set of artifacts is read
    pub fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    /// Start an exclusive write. Artifacts saved through the transaction
    /// become visible only when it commits.
    pub fn begin_write(&self) -> Result<ArtifactTransaction<'_>> {
        let guard = self.lock.write();
        self.ensure_dir()?;

        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let staging = self
            .root
            .join(format!("{}{}-{}", STAGING_PREFIX, std::process::id(), stamp));
        fs::create_dir(&staging).map_err(|e| PipelineError::io(&staging, e))?;
        debug!(staging = %staging.display(), "Opened artifact transaction");

        Ok(ArtifactTransaction {
            store: self,
            staging,
            written: Vec::new(),
            committed: false,
            _guard: guard,
        })
    }
}

/// Staged write set over an [`ArtifactStore`], holding its write lock.
///
/// Dropping an uncommitted transaction discards everything it staged.
pub struct ArtifactTransaction<'a> {
    store: &'a ArtifactStore,
    staging: PathBuf,
    written: Vec<String>,
    committed: bool,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl ArtifactTransaction<'_> {
    /// File names staged so far, in write order
    pub fn staged(&self) -> &[String] {
        &self.written
    }

    /// Move staged files over the live ones, in write order, then remove
    /// model artifacts this transaction did not produce.
    pub fn commit(mut self) -> Result<Vec<String>> {
        let root = &self.store.root;
        for file_name in &self.written {
            let from = self.staging.join(file_name);
            let to = root.join(file_name);
            fs::rename(&from, &to).map_err(|e| PipelineError::io(&to, e))?;
        }

        for kind in ModelKind::ALL {
            let file_name = ArtifactName::Model(kind).file_name();
            if self.written.contains(&file_name) {
                continue;
            }
            let stale = root.join(&file_name);
            if stale.is_file() {
                fs::remove_file(&stale).map_err(|e| PipelineError::io(&stale, e))?;
                info!(artifact = %file_name, "Removed stale model artifact");
            }
        }

        fs::remove_dir_all(&self.staging).map_err(|e| PipelineError::io(&self.staging, e))?;
        self.committed = true;
        info!(
            dir = %root.display(),
            artifacts = self.written.len(),
            "Committed artifacts"
        );
        Ok(std::mem::take(&mut self.written))
    }
}

impl ArtifactWriter for ArtifactTransaction<'_> {
    fn save<T: Serialize>(&mut self, name: ArtifactName, value: &T) -> Result<()> {
        let file_name = name.file_name();
        write_json(&self.staging.join(&file_name), value)?;
        debug!(artifact = %file_name, "Staged artifact");
        if !self.written.contains(&file_name) {
            self.written.push(file_name);
        }
        Ok(())
    }
}

impl Drop for ArtifactTransaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            warn!(staging = %self.staging.display(), error = %e, "Failed to discard staged artifacts");
        } else {
            debug!(staging = %self.staging.display(), "Discarded staged artifacts");
        }
    }
}

/// Deserialize one JSON artifact from `path`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| not_found_or_io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, json).map_err(|e| PipelineError::io(path, e))
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> PipelineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PipelineError::ArtifactNotFound {
            artifact: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
        }
    } else {
        PipelineError::io(path, e)
    }
}
