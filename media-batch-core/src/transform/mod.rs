//! Transformation strategies: how one source item becomes its published artifacts.
//!
//! A strategy fixes the naming convention (which inputs are eligible, what
//! the completion identifier is called) and drives the external tool that
//! produces the local result files. The batch driver is generic over
//! [`TransformStrategy`]; the kind is selected per run from configuration.

mod audio;
mod metadata;
mod transcript;

pub use audio::AudioStrategy;
pub use metadata::MetadataStrategy;
pub use transcript::{TranscriptStrategy, TRANSCRIPTS_DIR};

use std::path::Path;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::scratch::{ScratchDir, ScratchFile};

/// Types/kinds of transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Demux the audio track of each video into `{base}.m4a`.
    Audio,
    /// Write a JSON metadata document `{base}_metadata.json` per video.
    Metadata,
    /// Transcribe each audio file into four text files under `transcripts/`.
    Transcript,
}

impl From<&str> for TransformKind {
    fn from(s: &str) -> Self {
        match s {
            "Audio" | "audio" | "extract_audio" => TransformKind::Audio,
            "Metadata" | "metadata" | "extract_metadata" => TransformKind::Metadata,
            "Transcript" | "transcript" | "transcribe" => TransformKind::Transcript,
            other => {
                tracing::warn!(kind = other, "Unknown transform kind, defaulting to Audio");
                TransformKind::Audio
            }
        }
    }
}

/// One local result file ready for publishing.
#[derive(Debug)]
pub struct ProducedArtifact {
    /// Guard over the local file; dropping it reclaims the file.
    pub file: ScratchFile,
    /// Object name relative to the destination prefix.
    pub name: String,
    pub content_type: Option<String>,
}

/// A pluggable pipeline flavor.
#[async_trait]
pub trait TransformStrategy: Send + Sync {
    fn kind(&self) -> TransformKind;

    /// Extension (with leading dot) of eligible source objects.
    fn input_extension(&self) -> &str;

    /// Case-insensitive extension filter.
    fn accepts(&self, key: &str) -> bool {
        key.to_lowercase()
            .ends_with(&self.input_extension().to_lowercase())
    }

    /// Name of the artifact whose presence marks `base_name` as done,
    /// relative to the destination prefix.
    fn output_name(&self, base_name: &str) -> String;

    /// Produces local result files from the acquired input.
    ///
    /// Every file created must be held by a [`ScratchFile`] so that it is
    /// reclaimed on all paths, including this method returning an error.
    async fn transform(
        &self,
        input: &Path,
        base_name: &str,
        scratch: &ScratchDir,
    ) -> Result<Vec<ProducedArtifact>, ToolError>;
}

/// Normalizes a configured extension to start with a dot.
pub(crate) fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}
