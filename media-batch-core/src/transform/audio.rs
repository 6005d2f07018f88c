use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{dotted, ProducedArtifact, TransformKind, TransformStrategy};
use crate::contract::AudioExtractor;
use crate::error::ToolError;
use crate::scratch::ScratchDir;

const OUTPUT_EXTENSION: &str = ".m4a";

/// Video in, audio track (`{base}.m4a`) out.
pub struct AudioStrategy<E> {
    extractor: E,
    input_extension: String,
}

impl<E: AudioExtractor> AudioStrategy<E> {
    pub fn new(extractor: E) -> Self {
        Self {
            extractor,
            input_extension: ".mp4".to_string(),
        }
    }

    pub fn with_input_extension(mut self, ext: &str) -> Self {
        self.input_extension = dotted(ext);
        self
    }
}

#[async_trait]
impl<E: AudioExtractor> TransformStrategy for AudioStrategy<E> {
    fn kind(&self) -> TransformKind {
        TransformKind::Audio
    }

    fn input_extension(&self) -> &str {
        &self.input_extension
    }

    fn output_name(&self, base_name: &str) -> String {
        format!("{base_name}{OUTPUT_EXTENSION}")
    }

    async fn transform(
        &self,
        input: &Path,
        base_name: &str,
        scratch: &ScratchDir,
    ) -> Result<Vec<ProducedArtifact>, ToolError> {
        let name = self.output_name(base_name);
        let output = scratch.file(&name);
        info!(input = %input.display(), output = %output.path().display(), "Extracting audio");
        self.extractor.extract_audio(input, output.path()).await?;
        info!(output = %output.path().display(), "Audio extracted successfully");
        Ok(vec![ProducedArtifact {
            file: output,
            name,
            content_type: Some("audio/mp4".to_string()),
        }])
    }
}
