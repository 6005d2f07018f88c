use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{dotted, ProducedArtifact, TransformKind, TransformStrategy};
use crate::contract::MetadataExtractor;
use crate::error::ToolError;
use crate::scratch::ScratchDir;

/// Video in, pretty-printed JSON metadata document out.
pub struct MetadataStrategy<E> {
    extractor: E,
    input_extension: String,
}

impl<E: MetadataExtractor> MetadataStrategy<E> {
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

/// Only a top-level mapping is accepted as a metadata document.
fn narrow_document(
    value: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, ToolError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ToolError::invalid_output(format!(
            "metadata document must be a mapping, got {other}"
        ))),
    }
}

#[async_trait]
impl<E: MetadataExtractor> TransformStrategy for MetadataStrategy<E> {
    fn kind(&self) -> TransformKind {
        TransformKind::Metadata
    }

    fn input_extension(&self) -> &str {
        &self.input_extension
    }

    fn output_name(&self, base_name: &str) -> String {
        format!("{base_name}_metadata.json")
    }

    async fn transform(
        &self,
        input: &Path,
        base_name: &str,
        scratch: &ScratchDir,
    ) -> Result<Vec<ProducedArtifact>, ToolError> {
        info!(input = %input.display(), "Extracting metadata");
        let document = narrow_document(self.extractor.extract_metadata(input).await?)?;
        debug!(fields = document.len(), "Metadata extracted");

        let name = self.output_name(base_name);
        let output = scratch.file(&name);
        let serialized = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(output.path(), serialized).await?;
        info!(output = %output.path().display(), "Metadata document written");

        Ok(vec![ProducedArtifact {
            file: output,
            name,
            content_type: Some("application/json".to_string()),
        }])
    }
}
