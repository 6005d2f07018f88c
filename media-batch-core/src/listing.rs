//! Lazy traversal of a paginated listing.

use futures::stream::{self, Stream, TryStreamExt};
use tracing::info;

use crate::contract::{Location, ObjectStore, ObjectSummary};
use crate::error::StoreError;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Streams every object in `location`, one page at a time.
///
/// The next page is only requested once the previous page has been
/// consumed. A failed page request ends the stream with that error.
pub fn list_objects<'a, S>(
    store: &'a S,
    location: &'a Location,
) -> impl Stream<Item = Result<ObjectSummary, StoreError>> + Send + 'a
where
    S: ObjectStore + ?Sized,
{
    stream::try_unfold((Cursor::Start, 0usize), move |(cursor, page_no)| async move {
        let token = match cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };
        let page = store.list_page(location, token).await?;
        let page_no = page_no + 1;
        info!(
            location = %location,
            page = page_no,
            objects = page.objects.len(),
            truncated = page.next_token.is_some(),
            "Fetched listing page"
        );
        let next = match page.next_token {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };
        let objects = stream::iter(page.objects.into_iter().map(Ok::<_, StoreError>));
        Ok::<_, StoreError>(Some((objects, (next, page_no))))
    })
    .try_flatten()
}
