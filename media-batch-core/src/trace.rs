//! The failures trace: one line per failed item.
//!
//! Progress narration goes through `tracing`; failed items are additionally
//! recorded here in a fixed `TAG: key` format so operators can grep or
//! replay them.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mockall::automock;
use tracing::warn;

use crate::item::FailureStage;

/// Append-only sink for failed items.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait FailureLog: Send + Sync {
    fn record(&self, stage: FailureStage, key: &str);
}

/// Formats one failures-trace line (without newline).
pub fn failure_line(stage: FailureStage, key: &str) -> String {
    format!("{}: {}", stage.tag(), key)
}

/// Appends failure lines to a file, creating it if absent.
pub struct FileFailureLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileFailureLog {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailureLog for FileFailureLog {
    fn record(&self, stage: FailureStage, key: &str) {
        let line = failure_line(stage, key);
        let written = match self.file.lock() {
            Ok(mut file) => writeln!(file, "{line}").and_then(|_| file.flush()),
            Err(poisoned) => {
                let mut file = poisoned.into_inner();
                writeln!(file, "{line}").and_then(|_| file.flush())
            }
        };
        if let Err(e) = written {
            warn!(error = ?e, path = %self.path.display(), line = %line, "Failed to write failures trace");
        }
    }
}
