//! Write operations.
//!
//! Operations that change the catalog check the identity before anything else,
//! so an anonymous call never reaches a loader, the store or the bus.

use library_storage::{Author, Book, DataStore, User};
use serde::Deserialize;
use tracing::{info, instrument};

use super::views::{author_view, book_view, AuthorView, BookView, UserView};
use crate::auth::{SessionStore, Token};
use crate::context::RequestContext;
use crate::error::{LibraryError, LibraryResult};
use crate::events::{self, LibraryBus, LibraryEvent};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub favorite_genre: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddAuthorInput {
    pub name: String,
    #[serde(default)]
    pub born: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddBookInput {
    pub title: String,
    pub published: i32,
    /// Author name; the author is created when unknown.
    pub author: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditAuthorInput {
    pub name: String,
    pub set_born_to: i32,
}

/// Registers a user.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn create_user<S: DataStore>(
    ctx: &RequestContext<S>,
    input: CreateUserInput,
) -> LibraryResult<UserView> {
    let user = ctx
        .store()
        .save_user(User::new(input.username, input.favorite_genre))
        .await?;
    info!(user_id = %user.id, "user created");
    Ok(user.into())
}

/// Exchanges credentials for a token.
#[instrument(skip(sessions, input), fields(username = %input.username))]
pub async fn login<S: DataStore>(sessions: &SessionStore<S>, input: LoginInput) -> LibraryResult<Token> {
    sessions.login(&input.username, &input.password).await
}

/// Adds an author and publishes `AUTHOR_ADDED`.
#[instrument(skip(ctx, bus), fields(request_id = %ctx.request_id()))]
pub async fn add_author<S: DataStore>(
    ctx: &RequestContext<S>,
    bus: &LibraryBus,
    input: AddAuthorInput,
) -> LibraryResult<AuthorView> {
    ctx.require_identity("add_author")?;

    let author = ctx
        .store()
        .save_author(Author::new(input.name, input.born))
        .await?;
    info!(author_id = %author.id, name = %author.name, "author added");

    ctx.authors().prime(author.id, author.clone());
    events::publish(bus, LibraryEvent::AuthorAdded(author.clone()));

    author_view(ctx, author).await
}

/// Adds a book, creating its author when the name is unknown.
///
/// Publishes `AUTHOR_ADDED` for a created author, then `BOOK_ADDED`.
#[instrument(skip(ctx, bus), fields(request_id = %ctx.request_id()))]
pub async fn add_book<S: DataStore>(
    ctx: &RequestContext<S>,
    bus: &LibraryBus,
    input: AddBookInput,
) -> LibraryResult<BookView> {
    ctx.require_identity("add_book")?;

    let mut book = Book::new(input.title, input.published, Default::default(), input.genres);
    // A rejected book must not leave a new author behind.
    book.validate()?;
    let title = book.title.trim();
    if ctx.store().find_book_by_title(title).await?.is_some() {
        return Err(LibraryError::Conflict {
            entity: "book",
            value: title.to_string(),
        });
    }

    let author = match ctx.store().find_author_by_name(input.author.trim()).await? {
        Some(author) => author,
        None => {
            let author = ctx
                .store()
                .save_author(Author::new(input.author, None))
                .await?;
            info!(author_id = %author.id, name = %author.name, "author added with book");
            events::publish(bus, LibraryEvent::AuthorAdded(author.clone()));
            author
        }
    };

    book.author = author.id;
    let book = ctx.store().save_book(book).await?;
    info!(book_id = %book.id, title = %book.title, "book added");

    ctx.authors().prime(author.id, author.clone());
    ctx.book_counts().clear(&author.id);
    events::publish(bus, LibraryEvent::BookAdded(book.clone()));

    book_view(ctx, book).await
}

/// Sets an existing author's birth year.
#[instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn edit_author<S: DataStore>(
    ctx: &RequestContext<S>,
    input: EditAuthorInput,
) -> LibraryResult<AuthorView> {
    ctx.require_identity("edit_author")?;

    let mut author = ctx
        .store()
        .find_author_by_name(&input.name)
        .await?
        .ok_or_else(|| LibraryError::NotFound {
            entity: "author",
            id: input.name.clone(),
        })?;

    author.born = Some(input.set_born_to);
    let author = ctx.store().save_author(author).await?;
    info!(author_id = %author.id, born = input.set_born_to, "author edited");

    ctx.authors().clear(&author.id);
    ctx.authors().prime(author.id, author.clone());

    author_view(ctx, author).await
}
