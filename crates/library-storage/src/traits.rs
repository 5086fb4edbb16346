//! DataStore trait definition.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::records::{Author, AuthorId, Book, BookId, User, UserId};

/// Filter for listing books. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Only books written by this author.
    pub author: Option<AuthorId>,
    /// Only books tagged with this genre.
    pub genre: Option<String>,
}

impl BookFilter {
    pub fn by_author(author: AuthorId) -> Self {
        Self {
            author: Some(author),
            genre: None,
        }
    }

    pub fn by_genre(genre: impl Into<String>) -> Self {
        Self {
            author: None,
            genre: Some(genre.into()),
        }
    }

    /// Returns `true` if `book` passes every set field.
    pub fn matches(&self, book: &Book) -> bool {
        self.author.map_or(true, |author| book.author == author)
            && self.genre.as_deref().map_or(true, |genre| book.has_genre(genre))
    }
}

/// Backend health reported by [`DataStore::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub backend: &'static str,
    pub message: Option<String>,
}

/// Abstract storage interface for library data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. List operations return records in insertion order.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Fetch-many operations, called once per loader batch

    /// Returns the authors with the given ids; unknown ids are absent.
    async fn authors_by_ids(&self, ids: &[AuthorId]) -> StorageResult<HashMap<AuthorId, Author>>;

    /// Returns the books with the given ids; unknown ids are absent.
    async fn books_by_ids(&self, ids: &[BookId]) -> StorageResult<HashMap<BookId, Book>>;

    /// Counts books per author. Every requested id is present in the result,
    /// with zero for authors without books.
    async fn book_counts_by_author(
        &self,
        ids: &[AuthorId],
    ) -> StorageResult<HashMap<AuthorId, usize>>;

    // Listing and lookup

    /// Lists books matching the filter.
    async fn list_books(&self, filter: &BookFilter) -> StorageResult<Vec<Book>>;

    /// Lists all authors.
    async fn list_authors(&self) -> StorageResult<Vec<Author>>;

    /// Finds an author by exact name.
    async fn find_author_by_name(&self, name: &str) -> StorageResult<Option<Author>>;

    /// Finds a book by exact title.
    async fn find_book_by_title(&self, title: &str) -> StorageResult<Option<Book>>;

    /// Finds a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> StorageResult<Option<User>>;

    /// Gets a user by id.
    async fn get_user(&self, id: UserId) -> StorageResult<Option<User>>;

    /// Total number of books.
    async fn count_books(&self) -> StorageResult<usize>;

    /// Total number of authors.
    async fn count_authors(&self) -> StorageResult<usize>;

    // Writes

    /// Inserts or replaces an author (keyed by id).
    ///
    /// Fails with `Validation` for a short name and `Duplicate` when another
    /// author already has the name.
    async fn save_author(&self, author: Author) -> StorageResult<Author>;

    /// Inserts or replaces a book (keyed by id).
    ///
    /// Fails with `Validation` for a short title, `Duplicate` when another
    /// book has the title and `NotFound` when the author does not exist.
    async fn save_book(&self, book: Book) -> StorageResult<Book>;

    /// Inserts or replaces a user (keyed by id).
    async fn save_user(&self, user: User) -> StorageResult<User>;

    /// Reports whether the backend can serve requests.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_filter_matches() {
        let author = AuthorId::new();
        let book = Book::new("Refactoring", 1999, author, vec!["classic".into()]);

        assert!(BookFilter::default().matches(&book));
        assert!(BookFilter::by_author(author).matches(&book));
        assert!(!BookFilter::by_author(AuthorId::new()).matches(&book));
        assert!(BookFilter::by_genre("classic").matches(&book));
        assert!(!BookFilter::by_genre("crime").matches(&book));

        let both = BookFilter {
            author: Some(author),
            genre: Some("crime".to_string()),
        };
        assert!(!both.matches(&book));
    }
}
