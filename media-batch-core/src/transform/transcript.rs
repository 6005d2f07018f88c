use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{dotted, ProducedArtifact, TransformKind, TransformStrategy};
use crate::contract::Transcriber;
use crate::error::ToolError;
use crate::scratch::ScratchDir;
use crate::timestamps::{chunk_by_window, format_units, merge_untimestamped, Transcription};

/// Sub-folder of the destination prefix that holds transcript files.
pub const TRANSCRIPTS_DIR: &str = "transcripts";

const WINDOWS: [u32; 2] = [30, 60];
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Audio in, four transcript text files out:
/// full text, per-word timestamps, and 30s / 60s windowed chunks.
pub struct TranscriptStrategy<T> {
    transcriber: T,
    input_extension: String,
}

impl<T: Transcriber> TranscriptStrategy<T> {
    pub fn new(transcriber: T) -> Self {
        Self {
            transcriber,
            input_extension: ".m4a".to_string(),
        }
    }

    pub fn with_input_extension(mut self, ext: &str) -> Self {
        self.input_extension = dotted(ext);
        self
    }
}

async fn write_text(
    scratch: &ScratchDir,
    file_name: String,
    contents: String,
) -> Result<ProducedArtifact, ToolError> {
    let file = scratch.file(&file_name);
    tokio::fs::write(file.path(), contents).await?;
    Ok(ProducedArtifact {
        file,
        name: format!("{TRANSCRIPTS_DIR}/{file_name}"),
        content_type: Some(TEXT_PLAIN.to_string()),
    })
}

#[async_trait]
impl<T: Transcriber> TransformStrategy for TranscriptStrategy<T> {
    fn kind(&self) -> TransformKind {
        TransformKind::Transcript
    }

    fn input_extension(&self) -> &str {
        &self.input_extension
    }

    fn output_name(&self, base_name: &str) -> String {
        format!("{TRANSCRIPTS_DIR}/{base_name}_transcript.txt")
    }

    async fn transform(
        &self,
        input: &Path,
        base_name: &str,
        scratch: &ScratchDir,
    ) -> Result<Vec<ProducedArtifact>, ToolError> {
        info!(input = %input.display(), "Transcribing");
        let started = std::time::Instant::now();
        let raw = self.transcriber.transcribe(input, scratch.path()).await?;
        let transcription = Transcription::from_value(raw)?;
        info!(
            language = %transcription.language,
            units = transcription.units.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Transcription and alignment finished"
        );

        let units = merge_untimestamped(&transcription.units);

        let mut artifacts = Vec::with_capacity(2 + WINDOWS.len());
        artifacts.push(
            write_text(
                scratch,
                format!("{base_name}_transcript.txt"),
                transcription.full_text(),
            )
            .await?,
        );
        artifacts.push(
            write_text(
                scratch,
                format!("{base_name}_word_timestamps.txt"),
                format_units(&units),
            )
            .await?,
        );
        for window in WINDOWS {
            artifacts.push(
                write_text(
                    scratch,
                    format!("{base_name}_{window}sec_timestamps.txt"),
                    chunk_by_window(&units, window),
                )
                .await?,
            );
        }
        Ok(artifacts)
    }
}
