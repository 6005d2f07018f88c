///
/// This module implements the CLI interface for media-batch: command parsing,
/// main entrypoint, and wiring of the concrete store and tools into the engine.
///
/// All batch logic (inventory, enumeration, processing, reporting) lives in
/// the [`media-batch-core`] crate. This module is strictly CLI glue.
///
/// ## How To Use
/// - For command-line users: `media-batch sync --config config.yaml`, see `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// ## Exit status
/// Per-item failures are logged and written to `failed_files.log`; they do
/// not fail the process. Only configuration errors and run-fatal engine
/// errors do.
///
/// [`media-batch-core`]: ../../media-batch-core/
use crate::load_config::{load_config, TransformSection};
use crate::logging::{DEFAULT_LOG_DIR, FAILED_FILES_LOG};
use crate::s3::S3Store;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_batch_core::synchronise::synchronise;
use media_batch_core::tools::{FfmpegAudioExtractor, FfprobeMetadataExtractor, WhisperxTranscriber};
use media_batch_core::trace::FileFailureLog;
use media_batch_core::transform::{
    AudioStrategy, MetadataStrategy, TranscriptStrategy, TransformKind, TransformStrategy,
};
use std::path::PathBuf;

/// CLI for media-batch: resumable audio, metadata and transcript extraction
/// between S3 locations.
#[derive(Parser)]
#[clap(
    name = "media-batch",
    version,
    about = "Resumable batch extraction of audio, metadata and transcripts between S3 buckets"
)]
pub struct Cli {
    /// Directory for app.log and failed_files.log
    #[clap(long, global = true, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every source item whose output is missing at the destination
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Builds the pipeline flavor selected in the config.
async fn build_strategy(settings: &TransformSection) -> Box<dyn TransformStrategy> {
    let ext = settings.input_extension.as_deref();
    match settings.kind {
        TransformKind::Audio => {
            let strategy = AudioStrategy::new(FfmpegAudioExtractor::default());
            Box::new(match ext {
                Some(ext) => strategy.with_input_extension(ext),
                None => strategy,
            })
        }
        TransformKind::Metadata => {
            let strategy = MetadataStrategy::new(FfprobeMetadataExtractor::default());
            Box::new(match ext {
                Some(ext) => strategy.with_input_extension(ext),
                None => strategy,
            })
        }
        TransformKind::Transcript => {
            let device = settings.device.resolve().await;
            let strategy =
                TranscriptStrategy::new(WhisperxTranscriber::new(settings.model.clone(), device));
            Box::new(match ext {
                Some(ext) => strategy.with_input_extension(ext),
                None => strategy,
            })
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            tracing::info!(
                command = "sync",
                kind = ?config.transform.kind,
                source = %config.source,
                destination = %config.destination,
                "Starting synchronisation process"
            );

            let failures_path = cli.log_dir.join(FAILED_FILES_LOG);
            let failures = FileFailureLog::open(&failures_path).with_context(|| {
                format!("Failed to open failures log {}", failures_path.display())
            })?;
            let store = S3Store::new(&config.store).await;
            let strategy = build_strategy(&config.transform).await;

            match synchronise(&store, strategy.as_ref(), &config.synchronise_config(), &failures)
                .await
            {
                Ok(report) => {
                    tracing::info!(
                        command = "sync",
                        skipped = report.skipped(),
                        succeeded = report.succeeded(),
                        failed = report.failed(),
                        "Synchronisation complete"
                    );
                    tracing::debug!(command = "sync", ?report, "Synchronisation report");
                    if report.has_failures() {
                        tracing::warn!(
                            failed = report.failed(),
                            failures_log = %failures.path().display(),
                            "Some items failed, see failures log"
                        );
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Synchronisation failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
