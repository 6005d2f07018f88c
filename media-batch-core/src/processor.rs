//! The item processor: acquire → transform → publish → reclaim for one work item.
//!
//! Every stage returns a typed [`ItemError`]; the processor converts the
//! first error into an [`Outcome`] and never lets it reach the driver.
//! Reclaim is not a stage of its own: all local files are held by
//! [`ScratchFile`](crate::scratch::ScratchFile) guards owned by
//! [`ItemProcessor::run_stages`], so they are removed when it returns,
//! whichever way it returns.

use tracing::{error, info, info_span, Instrument};

use crate::contract::{Location, ObjectStore};
use crate::error::ItemError;
use crate::item::{file_name, Outcome, WorkItem};
use crate::scratch::{ScratchDir, ScratchFile};
use crate::transform::{ProducedArtifact, TransformStrategy};

/// Processes single work items against one source/destination pair.
pub struct ItemProcessor<'a, S: ?Sized, T: ?Sized> {
    store: &'a S,
    strategy: &'a T,
    source: &'a Location,
    destination: &'a Location,
    scratch: &'a ScratchDir,
}

impl<'a, S, T> ItemProcessor<'a, S, T>
where
    S: ObjectStore + ?Sized,
    T: TransformStrategy + ?Sized,
{
    pub fn new(
        store: &'a S,
        strategy: &'a T,
        source: &'a Location,
        destination: &'a Location,
        scratch: &'a ScratchDir,
    ) -> Self {
        Self {
            store,
            strategy,
            source,
            destination,
            scratch,
        }
    }

    /// Runs the pipeline for `item` and classifies the result.
    ///
    /// When this returns, no scratch file created for `item` remains.
    pub async fn process(&self, item: &WorkItem) -> Outcome {
        let span = info_span!("item", key = %item.source.key, output = %item.output);
        match self.run_stages(item).instrument(span).await {
            Ok(()) => Outcome::Succeeded,
            Err(e) => {
                error!(key = %item.source.key, stage = %e.stage(), error = %e, "Item processing failed");
                Outcome::Failed(e.stage())
            }
        }
    }

    async fn run_stages(&self, item: &WorkItem) -> Result<(), ItemError> {
        let input = self.acquire(item).await?;
        let artifacts = self.transform(item, &input).await?;
        self.publish(item, &artifacts).await?;
        info!(published = artifacts.len(), "Item processed");
        Ok(())
    }

    /// Copies the source object into scratch. A partial download is
    /// reclaimed by the returned guard's drop on the error path.
    async fn acquire(&self, item: &WorkItem) -> Result<ScratchFile, ItemError> {
        let key = &item.source.key;
        let input = self.scratch.file(file_name(key));
        info!(bucket = %self.source.bucket, path = %input.path().display(), "Downloading source object");
        self.store
            .get_object(self.source, key, input.path())
            .await
            .map_err(|source| ItemError::DownloadFailed {
                key: key.clone(),
                source,
            })?;
        info!(path = %input.path().display(), "Downloaded source object");
        Ok(input)
    }

    async fn transform(
        &self,
        item: &WorkItem,
        input: &ScratchFile,
    ) -> Result<Vec<ProducedArtifact>, ItemError> {
        self.strategy
            .transform(input.path(), &item.source.base_name, self.scratch)
            .await
            .map_err(|source| ItemError::TransformFailed {
                key: item.source.key.clone(),
                source,
            })
    }

    /// Uploads every artifact; stops at the first failure.
    ///
    /// The artifact named by the strategy's completion name goes last, so a
    /// partially published item is never taken as done by a later run.
    async fn publish(
        &self,
        item: &WorkItem,
        artifacts: &[ProducedArtifact],
    ) -> Result<(), ItemError> {
        let marker = self.strategy.output_name(&item.source.base_name);
        let (completion, rest): (Vec<_>, Vec<_>) =
            artifacts.iter().partition(|a| a.name == marker);
        for artifact in rest.into_iter().chain(completion) {
            let key = self.destination.key_for(&artifact.name);
            info!(
                local = %artifact.file.path().display(),
                destination = %self.destination,
                key = %key,
                "Uploading artifact"
            );
            self.store
                .put_object(
                    self.destination,
                    &key,
                    artifact.file.path(),
                    artifact.content_type.clone(),
                )
                .await
                .map_err(|source| ItemError::PublishFailed {
                    output: key.clone(),
                    source,
                })?;
            info!(key = %key, "Uploaded artifact");
        }
        Ok(())
    }
}
