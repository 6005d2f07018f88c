//! Work item data model: source items, derived output identifiers, outcomes.

use std::fmt;

use crate::contract::ObjectSummary;

/// A source object admitted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Object key in the source location.
    pub key: String,
    /// Size in bytes as reported by the listing.
    pub size: u64,
    /// Last modified timestamp (milliseconds since epoch), if the store reports one.
    pub last_modified: Option<u64>,
    /// The key with its path and extension stripped.
    pub base_name: String,
}

impl From<ObjectSummary> for SourceItem {
    fn from(obj: ObjectSummary) -> Self {
        let base_name = base_name(&obj.key).to_string();
        Self {
            key: obj.key,
            size: obj.size,
            last_modified: obj.last_modified,
            base_name,
        }
    }
}

/// Strips the directory part and the final extension from an object key.
///
/// `videos/2024/clip.final.mp4` becomes `clip.final`. A leading dot does not
/// start an extension, so `.hidden` stays `.hidden`.
pub fn base_name(key: &str) -> &str {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    match file_name.rfind('.') {
        Some(idx) if file_name[..idx].chars().any(|c| c != '.') => &file_name[..idx],
        _ => file_name,
    }
}

/// The last path segment of an object key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Case-folds an identifier for completion matching.
pub fn normalize(identifier: &str) -> String {
    identifier.to_lowercase()
}

/// Full destination key of the artifact that marks an item as done.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputIdentifier(String);

impl OutputIdentifier {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }
}

impl fmt::Display for OutputIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source item paired with the output identifier derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: SourceItem,
    pub output: OutputIdentifier,
}

/// The stage at which an item's processing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Download,
    Transform,
    Publish,
}

impl FailureStage {
    /// Fixed tag written to the failures trace.
    pub fn tag(&self) -> &'static str {
        match self {
            FailureStage::Download => "DOWNLOAD_FAILED",
            FailureStage::Transform => "EXTRACTION_FAILED",
            FailureStage::Publish => "UPLOAD_FAILED",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Terminal classification of one item's processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Succeeded,
    Failed(FailureStage),
}
