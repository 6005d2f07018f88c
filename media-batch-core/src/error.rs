//! Error taxonomy for the batch engine.
//!
//! Collaborator errors ([`StoreError`], [`ToolError`]) describe what went
//! wrong inside a store or tool call. [`ItemError`] scopes a failure to one
//! work item and never leaves the item processor. [`EngineError`] is the
//! only error that aborts a run.

use std::path::PathBuf;
use thiserror::Error;

use crate::item::FailureStage;

/// Errors returned by an [`ObjectStore`](crate::contract::ObjectStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn list_failed(msg: impl Into<String>) -> Self {
        Self::ListFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }
}

/// Errors returned by the external transformation tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {tool}")]
    NotFound { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid tool output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolError {
    pub fn not_found(tool: impl Into<String>) -> Self {
        Self::NotFound { tool: tool.into() }
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }
}

/// A failure scoped to a single work item.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Download of {key} failed: {source}")]
    DownloadFailed { key: String, source: StoreError },

    #[error("Transform of {key} failed: {source}")]
    TransformFailed { key: String, source: ToolError },

    #[error("Publish of {output} failed: {source}")]
    PublishFailed { output: String, source: StoreError },
}

impl ItemError {
    /// The pipeline stage an item error terminates.
    pub fn stage(&self) -> FailureStage {
        match self {
            ItemError::DownloadFailed { .. } => FailureStage::Download,
            ItemError::TransformFailed { .. } => FailureStage::Transform,
            ItemError::PublishFailed { .. } => FailureStage::Publish,
        }
    }
}

/// Removal of a scratch artifact failed. Only ever logged.
#[derive(Debug, Error)]
#[error("Cleanup of {} failed: {source}", path.display())]
pub struct CleanupFailed {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Faults that abort a whole run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Listing of {location} unavailable: {source}")]
    ListingUnavailable {
        location: String,
        source: StoreError,
    },

    #[error("Scratch directory {} unavailable: {source}", path.display())]
    ScratchUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
}
