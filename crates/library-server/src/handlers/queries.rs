//! Read-only operations.

use library_storage::{BookFilter, DataStore};
use serde::Deserialize;
use tracing::instrument;

use super::views::{author_views, book_views, AuthorView, BookView, UserView};
use crate::context::RequestContext;
use crate::error::LibraryResult;

/// Optional filters for [`all_books`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllBooksArgs {
    /// Author name.
    pub author: Option<String>,
    pub genre: Option<String>,
}

pub async fn book_count<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<usize> {
    Ok(ctx.store().count_books().await?)
}

pub async fn author_count<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<usize> {
    Ok(ctx.store().count_authors().await?)
}

/// Lists books, optionally by author name and genre.
///
/// An unknown author name matches no books.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn all_books<S: DataStore>(
    ctx: &RequestContext<S>,
    args: AllBooksArgs,
) -> LibraryResult<Vec<BookView>> {
    let mut filter = BookFilter {
        author: None,
        genre: args.genre,
    };

    if let Some(name) = args.author.as_deref() {
        match ctx.store().find_author_by_name(name).await? {
            Some(author) => {
                filter.author = Some(author.id);
                ctx.authors().prime(author.id, author);
            }
            None => return Ok(Vec::new()),
        }
    }

    let books = ctx.store().list_books(&filter).await?;
    book_views(ctx, books).await
}

/// Lists authors with their book counts.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn all_authors<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<Vec<AuthorView>> {
    let authors = ctx.store().list_authors().await?;
    for author in &authors {
        ctx.authors().prime(author.id, author.clone());
    }
    author_views(ctx, authors).await
}

/// Distinct genres across all books, in first-seen order.
pub async fn all_genres<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<Vec<String>> {
    let books = ctx.store().list_books(&BookFilter::default()).await?;

    let mut genres: Vec<String> = Vec::new();
    for genre in books.into_iter().flat_map(|book| book.genres) {
        if !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    Ok(genres)
}

/// The signed-in user, if any.
pub async fn me<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<Option<UserView>> {
    Ok(ctx.identity().cloned().map(UserView::from))
}

/// Books in the signed-in user's favorite genre.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn favorite_books<S: DataStore>(ctx: &RequestContext<S>) -> LibraryResult<Vec<BookView>> {
    let user = ctx.require_identity("favorite_books")?;
    let filter = BookFilter::by_genre(user.favorite_genre.clone());
    let books = ctx.store().list_books(&filter).await?;
    book_views(ctx, books).await
}

/// Books tagged with `genre`.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn books_by_genre<S: DataStore>(
    ctx: &RequestContext<S>,
    genre: &str,
) -> LibraryResult<Vec<BookView>> {
    let books = ctx.store().list_books(&BookFilter::by_genre(genre)).await?;
    book_views(ctx, books).await
}
