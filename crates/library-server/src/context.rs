//! Per-operation request context.
//!
//! A [`RequestContext`] is built for every inbound operation and dropped with
//! its response. It owns one [`BatchLoader`] per key kind, so lookups made
//! while resolving the operation are coalesced and cached, and nothing is
//! shared with any other operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use library_domain::{BatchFn, BatchLoader, LoaderConfig};
use library_storage::{Author, AuthorId, Book, BookId, DataStore, StorageError, User};

use crate::error::{LibraryError, LibraryResult};

/// Fetches authors by id.
pub struct AuthorBatch<S> {
    store: Arc<S>,
}

#[async_trait]
impl<S: DataStore> BatchFn<AuthorId, Author> for AuthorBatch<S> {
    type Error = StorageError;

    async fn load(&self, keys: &[AuthorId]) -> Result<HashMap<AuthorId, Author>, StorageError> {
        self.store.authors_by_ids(keys).await
    }
}

/// Fetches books by id.
pub struct BookBatch<S> {
    store: Arc<S>,
}

#[async_trait]
impl<S: DataStore> BatchFn<BookId, Book> for BookBatch<S> {
    type Error = StorageError;

    async fn load(&self, keys: &[BookId]) -> Result<HashMap<BookId, Book>, StorageError> {
        self.store.books_by_ids(keys).await
    }
}

/// Counts books per author.
pub struct BookCountBatch<S> {
    store: Arc<S>,
}

#[async_trait]
impl<S: DataStore> BatchFn<AuthorId, usize> for BookCountBatch<S> {
    type Error = StorageError;

    async fn load(&self, keys: &[AuthorId]) -> Result<HashMap<AuthorId, usize>, StorageError> {
        self.store.book_counts_by_author(keys).await
    }
}

pub type AuthorLoader<S> = BatchLoader<AuthorId, Author, AuthorBatch<S>>;
pub type BookLoader<S> = BatchLoader<BookId, Book, BookBatch<S>>;
pub type BookCountLoader<S> = BatchLoader<AuthorId, usize, BookCountBatch<S>>;

/// Loaders, identity and request id for one operation.
pub struct RequestContext<S> {
    request_id: String,
    identity: Option<User>,
    store: Arc<S>,
    authors: AuthorLoader<S>,
    books: BookLoader<S>,
    book_counts: BookCountLoader<S>,
}

impl<S: DataStore> RequestContext<S> {
    /// Builds a context with empty loader caches.
    pub fn new(
        store: Arc<S>,
        identity: Option<User>,
        request_id: impl Into<String>,
        config: &LoaderConfig,
    ) -> Self {
        let authors = BatchLoader::with_config(
            "authors",
            AuthorBatch {
                store: Arc::clone(&store),
            },
            config.clone(),
        );
        let books = BatchLoader::with_config(
            "books",
            BookBatch {
                store: Arc::clone(&store),
            },
            config.clone(),
        );
        let book_counts = BatchLoader::with_config(
            "book_counts",
            BookCountBatch {
                store: Arc::clone(&store),
            },
            config.clone(),
        );

        Self {
            request_id: request_id.into(),
            identity,
            store,
            authors,
            books,
            book_counts,
        }
    }

    /// Authors by id.
    pub fn authors(&self) -> &AuthorLoader<S> {
        &self.authors
    }

    /// Books by id.
    pub fn books(&self) -> &BookLoader<S> {
        &self.books
    }

    /// Book count per author id; zero for authors without books.
    pub fn book_counts(&self) -> &BookCountLoader<S> {
        &self.book_counts
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn identity(&self) -> Option<&User> {
        self.identity.as_ref()
    }

    /// Returns the identity or `Forbidden` for `operation`.
    pub fn require_identity(&self, operation: &'static str) -> LibraryResult<&User> {
        self.identity
            .as_ref()
            .ok_or(LibraryError::Forbidden { operation })
    }

    /// Store for operations that are not keyed lookups.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> std::fmt::Debug for RequestContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("authenticated", &self.identity.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use library_storage::MemoryDataStore;

    use super::*;

    fn context(store: Arc<MemoryDataStore>, identity: Option<User>) -> RequestContext<MemoryDataStore> {
        RequestContext::new(store, identity, "req-1", &LoaderConfig::default())
    }

    #[tokio::test]
    async fn test_loaders_resolve_through_store() {
        let store = MemoryDataStore::new_shared();
        let author = store
            .save_author(Author::new("Robert Martin", None))
            .await
            .unwrap();
        let book = store
            .save_book(Book::new("Clean Code", 2008, author.id, vec![]))
            .await
            .unwrap();
        let ctx = context(store, None);

        let (loaded_author, loaded_book, count, missing) = tokio::join!(
            ctx.authors().load(author.id),
            ctx.books().load(book.id),
            ctx.book_counts().load(author.id),
            ctx.authors().load(AuthorId::new()),
        );

        assert_eq!(loaded_author.unwrap(), Some(author));
        assert_eq!(loaded_book.unwrap(), Some(book));
        assert_eq!(count.unwrap(), Some(1));
        assert_eq!(missing.unwrap(), None);
    }

    #[tokio::test]
    async fn test_contexts_do_not_share_caches() {
        let store = MemoryDataStore::new_shared();
        let author = store
            .save_author(Author::new("Robert Martin", None))
            .await
            .unwrap();

        let first = context(Arc::clone(&store), None);
        first.authors().load(author.id).await.unwrap();
        let second = context(store, None);

        assert!(first.authors().is_cached(&author.id));
        assert!(!second.authors().is_cached(&author.id));
    }

    #[test]
    fn test_require_identity() {
        let store = MemoryDataStore::new_shared();
        let anonymous = context(Arc::clone(&store), None);
        assert!(matches!(
            anonymous.require_identity("add_author"),
            Err(LibraryError::Forbidden { operation: "add_author" })
        ));

        let user = User::new("mluukkai", "refactoring");
        let signed_in = context(store, Some(user.clone()));
        assert_eq!(signed_in.require_identity("add_author").unwrap(), &user);
        assert_eq!(signed_in.request_id(), "req-1");
    }
}
