//! Response shapes and the loader-backed resolution of nested fields.

use futures::future::try_join_all;
use library_storage::{Author, AuthorId, Book, BookId, DataStore, User, UserId};
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{LibraryError, LibraryResult};

/// An author with its derived book count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorView {
    pub id: AuthorId,
    pub name: String,
    pub born: Option<i32>,
    pub book_count: usize,
}

/// A book with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookView {
    pub id: BookId,
    pub title: String,
    pub published: i32,
    pub genres: Vec<String>,
    pub author: AuthorView,
}

/// A user as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub favorite_genre: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            favorite_genre: user.favorite_genre,
        }
    }
}

/// Resolves `book_count` through the context's loader.
pub async fn author_view<S: DataStore>(
    ctx: &RequestContext<S>,
    author: Author,
) -> LibraryResult<AuthorView> {
    let book_count = ctx.book_counts().load(author.id).await?.unwrap_or(0);
    Ok(AuthorView {
        id: author.id,
        name: author.name,
        born: author.born,
        book_count,
    })
}

/// Resolves the book's author (and that author's book count).
pub async fn book_view<S: DataStore>(ctx: &RequestContext<S>, book: Book) -> LibraryResult<BookView> {
    let author = ctx
        .authors()
        .load(book.author)
        .await?
        .ok_or_else(|| LibraryError::NotFound {
            entity: "author",
            id: book.author.to_string(),
        })?;
    let author = author_view(ctx, author).await?;

    Ok(BookView {
        id: book.id,
        title: book.title,
        published: book.published,
        genres: book.genres,
        author,
    })
}

/// Resolves many authors concurrently so their lookups share batches.
pub async fn author_views<S: DataStore>(
    ctx: &RequestContext<S>,
    authors: Vec<Author>,
) -> LibraryResult<Vec<AuthorView>> {
    try_join_all(authors.into_iter().map(|author| author_view(ctx, author))).await
}

/// Resolves many books concurrently so their lookups share batches.
pub async fn book_views<S: DataStore>(
    ctx: &RequestContext<S>,
    books: Vec<Book>,
) -> LibraryResult<Vec<BookView>> {
    try_join_all(books.into_iter().map(|book| book_view(ctx, book))).await
}
