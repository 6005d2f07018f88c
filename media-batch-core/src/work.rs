//! Enumeration of eligible source items.

use futures::stream::{Stream, StreamExt};
use tracing::info;

use crate::contract::{Location, ObjectStore};
use crate::error::StoreError;
use crate::item::{OutputIdentifier, SourceItem, WorkItem};
use crate::listing::list_objects;
use crate::transform::TransformStrategy;

/// Derives the destination identifier for a source item. Pure.
pub fn derive_output<T>(strategy: &T, destination: &Location, item: &SourceItem) -> OutputIdentifier
where
    T: TransformStrategy + ?Sized,
{
    OutputIdentifier::new(destination.key_for(&strategy.output_name(&item.base_name)))
}

/// Streams the eligible items of `source`, each paired with its output identifier.
///
/// Objects whose key does not carry the strategy's input extension are
/// skipped with an info trace. The stream is lazy and can be recreated for
/// every run; listing errors are passed through.
pub fn enumerate_work<'a, S, T>(
    store: &'a S,
    strategy: &'a T,
    source: &'a Location,
    destination: &'a Location,
) -> impl Stream<Item = Result<WorkItem, StoreError>> + Send + 'a
where
    S: ObjectStore + ?Sized,
    T: TransformStrategy + ?Sized,
{
    list_objects(store, source).filter_map(move |listed| async move {
        match listed {
            Ok(obj) if strategy.accepts(&obj.key) => {
                let source = SourceItem::from(obj);
                let output = derive_output(strategy, destination, &source);
                Some(Ok(WorkItem { source, output }))
            }
            Ok(obj) => {
                info!(
                    key = %obj.key,
                    expected = strategy.input_extension(),
                    "Skipping object with non-matching extension"
                );
                None
            }
            Err(e) => Some(Err(e)),
        }
    })
}
