//! Inventory of outputs already present at the destination.

use std::collections::HashSet;

use futures::TryStreamExt;
use tracing::{debug, info};

use crate::contract::{Location, ObjectStore};
use crate::error::EngineError;
use crate::item::normalize;
use crate::listing::list_objects;

/// Case-folded identifiers of completed outputs.
///
/// Seeded from the destination listing at the start of a run and grown as
/// items succeed. It is never persisted and never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSet {
    keys: HashSet<String>,
}

impl CompletionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an identifier. Returns `false` if it was already present
    /// under any casing.
    pub fn insert(&mut self, identifier: &str) -> bool {
        self.keys.insert(normalize(identifier))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.keys.contains(&normalize(identifier))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for CompletionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CompletionSet::new();
        for identifier in iter {
            set.insert(identifier.as_ref());
        }
        set
    }
}

/// Lists every object at `destination` into a [`CompletionSet`].
///
/// An empty destination yields an empty set. A listing failure on any page
/// is reported as [`EngineError::ListingUnavailable`]; a partial inventory is
/// never returned.
pub async fn build_inventory<S>(
    store: &S,
    destination: &Location,
) -> Result<CompletionSet, EngineError>
where
    S: ObjectStore + ?Sized,
{
    debug!(destination = %destination, "Building inventory of existing outputs");
    let mut completed = CompletionSet::new();
    let mut objects = Box::pin(list_objects(store, destination));
    while let Some(obj) = objects
        .try_next()
        .await
        .map_err(|source| EngineError::ListingUnavailable {
            location: destination.to_string(),
            source,
        })?
    {
        completed.insert(&obj.key);
    }
    info!(
        destination = %destination,
        count = completed.len(),
        "Found existing outputs at destination"
    );
    Ok(completed)
}
