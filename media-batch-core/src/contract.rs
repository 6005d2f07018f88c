//! # contract: interfaces to the engine's external collaborators
//!
//! The batch engine never talks to a storage service or a media tool
//! directly. It goes through the traits in this module:
//!
//! - [`ObjectStore`]: paginated listing, download to a local path, upload from a local path.
//! - [`AudioExtractor`], [`MetadataExtractor`], [`Transcriber`]: the three
//!   transformation tools used by the pipeline flavors.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so consumers get `MockObjectStore`,
//!   `MockAudioExtractor` and friends with the `test-export-mocks` feature.
//!
//! ## Adding New Stores or Tools
//! - Implement the trait for your backend.
//! - Convert all upstream failures to [`StoreError`] / [`ToolError`]; the engine
//!   relies on the error alone to classify an item's outcome.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::error::{StoreError, ToolError};

/// A logical container in the object store: a bucket plus an optional key prefix.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Location {
    pub fn new(bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix,
        }
    }

    /// The prefix without surrounding slashes, or `None` when it is empty.
    pub fn normalized_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
    }

    /// Joins a relative object name onto this location's prefix.
    pub fn key_for(&self, name: &str) -> String {
        match self.normalized_prefix() {
            Some(prefix) => format!("{}/{}", prefix, name.trim_start_matches('/')),
            None => name.to_string(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized_prefix() {
            Some(prefix) => write!(f, "s3://{}/{}", self.bucket, prefix),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

/// One object as reported by a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Milliseconds since epoch.
    pub last_modified: Option<u64>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Token for the next page; `Some` exactly when the listing was truncated.
    pub next_token: Option<String>,
}

/// Object storage with paginated listing and file-based transfer.
///
/// Implementations own their timeouts and retries; the engine calls each
/// method once per attempt.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one listing page, starting after `continuation` when given.
    async fn list_page(
        &self,
        location: &Location,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError>;

    /// Copy an object to a local file, creating or truncating it.
    async fn get_object(
        &self,
        location: &Location,
        key: &str,
        destination: &Path,
    ) -> Result<(), StoreError>;

    /// Upload a local file under `key`, overwriting any existing object.
    async fn put_object(
        &self,
        location: &Location,
        key: &str,
        source: &Path,
        content_type: Option<String>,
    ) -> Result<(), StoreError>;
}

/// Demuxes the audio stream of a media file without re-encoding.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Produces a free-form metadata document for a media file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract_metadata(&self, input: &Path) -> Result<serde_json::Value, ToolError>;
}

/// Transcribes and word-aligns an audio file.
///
/// Returns the tool's raw document; see [`crate::timestamps::Transcription`]
/// for the accepted shape. Anything the tool writes under `work_dir` must be
/// removed before returning.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        work_dir: &Path,
    ) -> Result<serde_json::Value, ToolError>;
}
