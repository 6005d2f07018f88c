//! S3 implementation of the [`ObjectStore`] contract.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use media_batch_core::contract::{ListPage, Location, ObjectStore, ObjectSummary};
use media_batch_core::error::StoreError;
use tracing::{debug, info};

use crate::load_config::StoreSection;

/// Amazon S3 (or any S3-compatible endpoint) backed store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Builds a client from the default credential chain plus the
    /// configured region and optional custom endpoint.
    pub async fn new(settings: &StoreSection) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = Builder::from(&shared);
        if let Some(endpoint) = &settings.endpoint_url {
            info!(endpoint = %endpoint, "Using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        info!(region = %settings.region, "S3 client configured");
        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

/// S3 list prefix for a location: the normalized prefix plus a trailing slash.
fn list_prefix(location: &Location) -> Option<String> {
    location.normalized_prefix().map(|p| format!("{p}/"))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        location: &Location,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&location.bucket)
            .set_prefix(list_prefix(location))
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| StoreError::list_failed(format!("{location}: {e}")))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(ObjectSummary {
                    key: obj.key()?.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| t.to_millis().ok())
                        .map(|ms| ms as u64),
                })
            })
            .collect();

        let next_token = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage {
            objects,
            next_token,
        })
    }

    async fn get_object(
        &self,
        location: &Location,
        key: &str,
        destination: &Path,
    ) -> Result<(), StoreError> {
        debug!(bucket = %location.bucket, key, path = %destination.display(), "Downloading object");
        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err = e.into_service_error();
                if err.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::download_failed(format!("{key}: {err}"))
                }
            })?;

        let mut body = response.body.into_async_read();
        let mut file = tokio::fs::File::create(destination).await?;
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StoreError::download_failed(format!("{key}: {e}")))?;
        debug!(key, bytes, "Download complete");
        Ok(())
    }

    async fn put_object(
        &self,
        location: &Location,
        key: &str,
        source: &Path,
        content_type: Option<String>,
    ) -> Result<(), StoreError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StoreError::upload_failed(format!("{}: {e}", source.display())))?;
        self.client
            .put_object()
            .bucket(&location.bucket)
            .key(key)
            .body(body)
            .set_content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::upload_failed(format!("{key}: {e}")))?;
        debug!(bucket = %location.bucket, key, "Upload complete");
        Ok(())
    }
}
