//! Read-only view of the recordings directory.
//!
//! Anything serving files back to users goes through here so that listing order
//! and name validation stay in one place. A file only shows up complete once
//! the writer has returned, so readers should not assume more than that.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("invalid recording name: {0}")]
    InvalidName(String),

    #[error("recording not found: {0}")]
    NotFound(String),

    #[error("failed to read recordings directory: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct RecordingCatalog {
    dir: PathBuf,
}

impl RecordingCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `.wav` file names, newest modification time first.
    ///
    /// A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, CatalogError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut recordings: Vec<(SystemTime, String)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_wav(&path) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            recordings.push((modified, name.to_string()));
        }
        recordings.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(recordings.into_iter().map(|(_, name)| name).collect())
    }

    /// Path of the newest recording, if there is one.
    pub fn latest(&self) -> Result<Option<PathBuf>, CatalogError> {
        Ok(self.list()?.into_iter().next().map(|name| self.dir.join(name)))
    }

    /// Path of a named recording inside the directory.
    ///
    /// Only a bare `.wav` file name is accepted; separators, `..`, and links
    /// pointing outside the directory are rejected.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, CatalogError> {
        let invalid = || CatalogError::InvalidName(name.to_string());
        let candidate = Path::new(name);
        let mut components = candidate.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(invalid()),
        }
        if name.contains('/') || name.contains('\\') || !is_wav(candidate) {
            return Err(invalid());
        }

        let path = self.dir.join(candidate);
        if !path.is_file() {
            return Err(CatalogError::NotFound(name.to_string()));
        }
        let root = fs::canonicalize(&self.dir)?;
        let resolved = fs::canonicalize(&path)?;
        if resolved.parent() != Some(root.as_path()) {
            return Err(invalid());
        }
        Ok(resolved)
    }
}

/// Only a lowercase `.wav` extension counts.
fn is_wav(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("wav")
}
