//! Local scratch storage for artifacts in flight.
//!
//! Every local file the engine creates is held by a [`ScratchFile`] guard.
//! Dropping the guard removes the file, so whichever way an item's
//! processing exits (success, error, early return) its scratch files are
//! reclaimed before control returns to the driver.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{CleanupFailed, EngineError};

/// The process-wide scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Opens the scratch directory, creating it if absent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        let existed = root.is_dir();
        // Fails when the path exists but is not a directory.
        fs::create_dir_all(&root).map_err(|source| {
            tracing::error!(error = ?source, path = %root.display(), "Failed to create scratch directory");
            EngineError::ScratchUnavailable {
                path: root.clone(),
                source,
            }
        })?;
        if !existed {
            info!(path = %root.display(), "Created scratch directory");
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Claims `name` inside the scratch directory.
    ///
    /// Nothing is created on disk; the guard only takes ownership of the path.
    pub fn file(&self, name: &str) -> ScratchFile {
        ScratchFile {
            path: self.root.join(name),
        }
    }

    /// Names of everything currently in the scratch directory.
    pub fn entries(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Exclusive ownership of one scratch path. Removes the file on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Reclaimed scratch file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                let err = CleanupFailed {
                    path: self.path.clone(),
                    source,
                };
                warn!(error = %err, "Failed to reclaim scratch file");
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.remove();
    }
}
