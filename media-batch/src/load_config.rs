/// `load_config` module: Loads a static YAML config and adapts it into the
/// engine's [`SynchroniseConfig`] plus the CLI-only store and transform settings.
///
/// This module is the only place where untrusted YAML is parsed.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into intermediate, serde-friendly structs
/// - Fill defaults for every optional key
/// - Apply environment overrides (`AWS_REGION`, `S3_ENDPOINT_URL`)
/// - Map loosely-typed YAML values (transform kind, device) to domain enums
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use media_batch_core::contract::Location;
use media_batch_core::synchronise::SynchroniseConfig;
use media_batch_core::tools::ComputeDevice;
use media_batch_core::transform::TransformKind;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/video_processing";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL: &str = "base.en";

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub source: Location,
    pub destination: Location,
    pub scratch_dir: PathBuf,
    pub store: StoreSection,
    pub transform: TransformSection,
}

impl CliConfig {
    pub fn synchronise_config(&self) -> SynchroniseConfig {
        SynchroniseConfig {
            source: self.source.clone(),
            destination: self.destination.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformSection {
    pub kind: TransformKind,
    /// Overrides the flavor's default input extension.
    pub input_extension: Option<String>,
    pub model: String,
    pub device: ComputeDevice,
}

#[derive(Debug, Deserialize)]
struct RawTransform {
    kind: String,
    #[serde(default)]
    input_extension: Option<String>,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_device")]
    device: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    source: Location,
    destination: Location,
    #[serde(default = "default_scratch_dir")]
    scratch_dir: PathBuf,
    #[serde(default)]
    store: StoreSection,
    transform: RawTransform,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_device() -> String {
    "cuda".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

/// Loads a static YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut store = raw.store;
    if let Ok(region) = std::env::var("AWS_REGION") {
        if !region.is_empty() {
            store.region = region;
        }
    }
    if let Ok(endpoint) = std::env::var("S3_ENDPOINT_URL") {
        if !endpoint.is_empty() {
            store.endpoint_url = Some(endpoint);
        }
    }

    Ok(CliConfig {
        source: raw.source,
        destination: raw.destination,
        scratch_dir: raw.scratch_dir,
        store,
        transform: TransformSection {
            kind: TransformKind::from(raw.transform.kind.as_str()),
            input_extension: raw.transform.input_extension,
            model: raw.transform.model,
            device: ComputeDevice::from(raw.transform.device.as_str()),
        },
    })
}
