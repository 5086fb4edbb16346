//! Live event streams.
//!
//! Each delivered event is resolved in its own fresh context, the same way a
//! query would be, so derived fields reflect the state at delivery time.
//! Dropping a returned stream cancels the underlying bus subscription.

use futures::future;
use futures::stream::{BoxStream, StreamExt};
use library_storage::DataStore;

use super::views::{author_view, book_view, AuthorView, BookView};
use crate::error::LibraryResult;
use crate::events::{LibraryEvent, AUTHOR_ADDED, BOOK_ADDED};
use crate::library::Library;

/// Authors as they are added.
pub fn author_added<S: DataStore>(library: &Library<S>) -> BoxStream<'static, LibraryResult<AuthorView>> {
    let library = library.clone();
    library
        .bus()
        .subscribe(AUTHOR_ADDED)
        .filter_map(|event| {
            future::ready(match event {
                LibraryEvent::AuthorAdded(author) => Some(author),
                LibraryEvent::BookAdded(_) => None,
            })
        })
        .then(move |author| {
            let ctx = library.background_context();
            async move { author_view(&ctx, author).await }
        })
        .boxed()
}

/// Books as they are added.
pub fn book_added<S: DataStore>(library: &Library<S>) -> BoxStream<'static, LibraryResult<BookView>> {
    let library = library.clone();
    library
        .bus()
        .subscribe(BOOK_ADDED)
        .filter_map(|event| {
            future::ready(match event {
                LibraryEvent::BookAdded(book) => Some(book),
                LibraryEvent::AuthorAdded(_) => None,
            })
        })
        .then(move |book| {
            let ctx = library.background_context();
            async move { book_view(&ctx, book).await }
        })
        .boxed()
}
