//! Stored records and their typed ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Minimum author name length, counted in characters after trimming.
pub const MIN_AUTHOR_NAME_LEN: usize = 4;
/// Minimum book title length, counted in characters after trimming.
pub const MIN_BOOK_TITLE_LEN: usize = 5;
/// Minimum username length, counted in characters after trimming.
pub const MIN_USERNAME_LEN: usize = 3;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id!(
    /// Identifier of an [`Author`].
    AuthorId
);
record_id!(
    /// Identifier of a [`Book`].
    BookId
);
record_id!(
    /// Identifier of a [`User`].
    UserId
);

/// A book author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub born: Option<i32>,
}

impl Author {
    pub fn new(name: impl Into<String>, born: Option<i32>) -> Self {
        Self {
            id: AuthorId::new(),
            name: name.into(),
            born,
        }
    }

    /// Checks the fields validated on save without touching a store.
    pub fn validate(&self) -> StorageResult<()> {
        validate_min_len("name", &self.name, MIN_AUTHOR_NAME_LEN)
    }
}

/// A book, referencing its author by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub published: i32,
    pub author: AuthorId,
    pub genres: Vec<String>,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        published: i32,
        author: AuthorId,
        genres: Vec<String>,
    ) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            published,
            author,
            genres,
        }
    }

    /// Checks the fields validated on save without touching a store.
    pub fn validate(&self) -> StorageResult<()> {
        validate_min_len("title", &self.title, MIN_BOOK_TITLE_LEN)
    }

    /// Returns `true` if the book is tagged with `genre`.
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub favorite_genre: String,
}

impl User {
    pub fn new(username: impl Into<String>, favorite_genre: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            favorite_genre: favorite_genre.into(),
        }
    }

    /// Checks the fields validated on save without touching a store.
    pub fn validate(&self) -> StorageResult<()> {
        validate_min_len("username", &self.username, MIN_USERNAME_LEN)
    }
}

fn validate_min_len(field: &'static str, value: &str, min: usize) -> StorageResult<()> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(StorageError::Validation {
            field,
            message: format!("must be at least {min} characters, got {len}"),
        });
    }
    Ok(())
}

/// Normalizes and validates an author before it is saved.
pub(crate) fn normalize_author(mut author: Author) -> StorageResult<Author> {
    author.validate()?;
    author.name = author.name.trim().to_string();
    Ok(author)
}

/// Normalizes and validates a book before it is saved.
///
/// Genres are trimmed; blank and repeated genres are dropped.
pub(crate) fn normalize_book(mut book: Book) -> StorageResult<Book> {
    book.validate()?;
    book.title = book.title.trim().to_string();

    let mut genres: Vec<String> = Vec::with_capacity(book.genres.len());
    for genre in book.genres.drain(..) {
        let genre = genre.trim().to_string();
        if !genre.is_empty() && !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    book.genres = genres;
    Ok(book)
}

/// Normalizes and validates a user before it is saved.
pub(crate) fn normalize_user(mut user: User) -> StorageResult<User> {
    user.validate()?;
    user.username = user.username.trim().to_string();
    user.favorite_genre = user.favorite_genre.trim().to_string();
    Ok(user)
}
