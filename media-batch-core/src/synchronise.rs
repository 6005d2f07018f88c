//! High-level pipeline: brings a destination location up to date with a source location.
//!
//! This module provides the batch driver. One call to [`synchronise`] is one run:
//!   - Builds the inventory of outputs already present at the destination
//!   - Streams eligible source items page by page
//!   - Skips items whose derived output is already done, without any I/O
//!   - Runs the [`ItemProcessor`] for everything else, one item at a time
//!   - Records every outcome, and every failure to the [`FailureLog`]
//!
//! # Major Types
//! - [`SynchroniseConfig`]: source, destination and scratch directory for a run
//! - [`SynchroniseReport`]: per-item outcomes for the run
//!
//! # Responsibilities
//! - Failure isolation: an item's failure never stops the batch
//! - Idempotence: reruns skip everything already published
//! - The completion set lives only for the duration of the run
//!
//! # Error Handling
//! Only run-fatal faults are returned as [`EngineError`]: an unusable scratch
//! directory or a failing source listing. A failing destination listing
//! degrades to an empty inventory with a warning.

use futures::StreamExt;
use tracing::{info, info_span, warn, Instrument};

use crate::contract::{Location, ObjectStore};
use crate::error::EngineError;
use crate::inventory::{build_inventory, CompletionSet};
use crate::item::{FailureStage, OutputIdentifier, Outcome};
use crate::processor::ItemProcessor;
use crate::scratch::ScratchDir;
use crate::trace::FailureLog;
use crate::transform::TransformStrategy;
use crate::work::enumerate_work;

/// The top-level synchronise configuration.
#[derive(Debug, Clone)]
pub struct SynchroniseConfig {
    pub source: Location,
    pub destination: Location,
    pub scratch_dir: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub key: String,
    pub output: OutputIdentifier,
    pub outcome: Outcome,
}

/// Outcomes of one run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct SynchroniseReport {
    pub items: Vec<ItemReport>,
}

impl SynchroniseReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| *o == Outcome::Skipped)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| *o == Outcome::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    /// Items that failed at `stage`.
    pub fn failed_at(&self, stage: FailureStage) -> Vec<&ItemReport> {
        self.items
            .iter()
            .filter(|i| i.outcome == Outcome::Failed(stage))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

/// Runs one batch.
pub async fn synchronise<S, T, F>(
    store: &S,
    strategy: &T,
    config: &SynchroniseConfig,
    failures: &F,
) -> Result<SynchroniseReport, EngineError>
where
    S: ObjectStore + ?Sized,
    T: TransformStrategy + ?Sized,
    F: FailureLog + ?Sized,
{
    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("synchronise", %run_id, kind = ?strategy.kind());
    run(store, strategy, config, failures).instrument(span).await
}

async fn run<S, T, F>(
    store: &S,
    strategy: &T,
    config: &SynchroniseConfig,
    failures: &F,
) -> Result<SynchroniseReport, EngineError>
where
    S: ObjectStore + ?Sized,
    T: TransformStrategy + ?Sized,
    F: FailureLog + ?Sized,
{
    info!(
        source = %config.source,
        destination = %config.destination,
        "[SYNC] Starting batch run"
    );
    let scratch = ScratchDir::open(&config.scratch_dir)?;

    // Step 1: inventory of what is already done.
    let mut completed = match build_inventory(store, &config.destination).await {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, "[SYNC] Destination listing failed, proceeding with empty inventory");
            CompletionSet::new()
        }
    };

    // Step 2-5: stream work, skip or process, record.
    let processor = ItemProcessor::new(
        store,
        strategy,
        &config.source,
        &config.destination,
        &scratch,
    );
    let mut report = SynchroniseReport::default();
    let mut work = Box::pin(enumerate_work(
        store,
        strategy,
        &config.source,
        &config.destination,
    ));

    while let Some(next) = work.next().await {
        let item = next.map_err(|source| {
            tracing::error!(source_location = %config.source, error = %source, "[SYNC][ERROR] Source listing failed");
            EngineError::ListingUnavailable {
                location: config.source.to_string(),
                source,
            }
        })?;

        let outcome = if completed.contains(item.output.as_str()) {
            info!(key = %item.source.key, output = %item.output, "[SYNC] Output already exists, skipping");
            Outcome::Skipped
        } else {
            info!(key = %item.source.key, size = item.source.size, "[SYNC] Processing source item");
            let outcome = processor.process(&item).await;
            match outcome {
                Outcome::Succeeded => {
                    completed.insert(item.output.as_str());
                }
                Outcome::Failed(stage) => failures.record(stage, &item.source.key),
                Outcome::Skipped => {}
            }
            outcome
        };

        report.items.push(ItemReport {
            key: item.source.key,
            output: item.output,
            outcome,
        });
    }

    match scratch.entries() {
        Ok(left) if !left.is_empty() => {
            warn!(entries = ?left, path = %scratch.path().display(), "[SYNC] Scratch directory not empty after run")
        }
        Ok(_) => {}
        Err(e) => warn!(error = ?e, "[SYNC] Could not inspect scratch directory"),
    }

    info!(
        items = report.items.len(),
        skipped = report.skipped(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "[SYNC] Processing complete"
    );
    Ok(report)
}
