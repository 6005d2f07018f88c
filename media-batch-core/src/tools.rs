//! Subprocess-backed implementations of the tool contracts.
//!
//! - [`FfmpegAudioExtractor`]: `ffmpeg -hide_banner -loglevel error -y -i <in> -vn -acodec copy <out>`
//! - [`FfprobeMetadataExtractor`]: `ffprobe -print_format json -show_format -show_streams`
//! - [`WhisperxTranscriber`]: the `whisperx` CLI with JSON output
//!
//! A missing executable maps to [`ToolError::NotFound`]; a non-zero exit maps
//! to [`ToolError::Failed`] carrying the tool's stderr.

use std::ffi::OsString;
use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::contract::{AudioExtractor, MetadataExtractor, Transcriber};
use crate::error::ToolError;

async fn run_tool(tool: &str, cmd: &mut Command) -> Result<Output, ToolError> {
    debug!(tool, command = ?cmd.as_std(), "Spawning tool");
    let output = cmd.kill_on_drop(true).output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::not_found(tool)
        } else {
            ToolError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Stream-copies the audio track with ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    binary: String,
}

impl Default for FfmpegAudioExtractor {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegAudioExtractor {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Stream copy of the audio track, no re-encode.
fn audio_copy_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_os_string());
    args.extend(["-vn", "-acodec", "copy"].into_iter().map(OsString::from));
    args.push(output.as_os_str().to_os_string());
    args
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(audio_copy_args(input, output));
        run_tool("ffmpeg", &mut cmd).await?;
        info!(output = %output.display(), "Extracted audio");
        Ok(())
    }
}

/// Probes container and stream metadata with ffprobe.
#[derive(Debug, Clone)]
pub struct FfprobeMetadataExtractor {
    binary: String,
}

impl Default for FfprobeMetadataExtractor {
    fn default() -> Self {
        Self {
            binary: "ffprobe".to_string(),
        }
    }
}

impl FfprobeMetadataExtractor {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl MetadataExtractor for FfprobeMetadataExtractor {
    async fn extract_metadata(&self, input: &Path) -> Result<serde_json::Value, ToolError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input);
        let output = run_tool("ffprobe", &mut cmd).await?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Where the transcription model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cuda,
    Cpu,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Cuda => "cuda",
            ComputeDevice::Cpu => "cpu",
        }
    }

    /// Keeps `Cuda` only when a GPU is visible to `nvidia-smi`.
    pub async fn resolve(self) -> Self {
        if self == ComputeDevice::Cpu {
            return self;
        }
        let available = Command::new("nvidia-smi")
            .arg("-L")
            .output()
            .await
            .map(|o| o.status.success() && !o.stdout.is_empty())
            .unwrap_or(false);
        if available {
            ComputeDevice::Cuda
        } else {
            warn!("CUDA not available, falling back to CPU");
            ComputeDevice::Cpu
        }
    }
}

impl From<&str> for ComputeDevice {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => ComputeDevice::Cpu,
            _ => ComputeDevice::Cuda,
        }
    }
}

/// Runs the whisperx CLI and reads back its JSON result.
#[derive(Debug, Clone)]
pub struct WhisperxTranscriber {
    binary: String,
    model: String,
    device: ComputeDevice,
}

impl WhisperxTranscriber {
    pub fn new(model: impl Into<String>, device: ComputeDevice) -> Self {
        Self {
            binary: "whisperx".to_string(),
            model: model.into(),
            device,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl Transcriber for WhisperxTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        work_dir: &Path,
    ) -> Result<serde_json::Value, ToolError> {
        // Removed with everything whisperx wrote when `out_dir` drops.
        let out_dir = tempfile::Builder::new()
            .prefix("whisperx-")
            .tempdir_in(work_dir)?;
        info!(model = %self.model, device = self.device.as_str(), "Loading transcription model");

        let mut cmd = Command::new(&self.binary);
        cmd.arg(audio)
            .args(["--model", &self.model])
            .args(["--device", self.device.as_str()])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(out_dir.path());
        if self.device == ComputeDevice::Cpu {
            cmd.args(["--compute_type", "int8"]);
        }
        run_tool("whisperx", &mut cmd).await?;

        let stem = audio
            .file_stem()
            .ok_or_else(|| ToolError::invalid_output("audio path has no file name"))?;
        let mut file_name = stem.to_os_string();
        file_name.push(".json");
        let result = out_dir.path().join(file_name);
        let raw = tokio::fs::read(&result).await.map_err(|e| {
            ToolError::invalid_output(format!("missing {}: {e}", result.display()))
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }
}
