//! In-memory storage implementation.
//!
//! Records live in `DashMap`s keyed by id. Unique fields (author name, book
//! title, username) have their own index maps that are claimed through the
//! entry API, so two concurrent saves of the same name cannot both succeed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::records::{
    normalize_author, normalize_book, normalize_user, Author, AuthorId, Book, BookId, User,
    UserId,
};
use crate::traits::{BookFilter, DataStore, HealthStatus};

/// A stored record plus its insertion sequence number.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    record: T,
}

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Fetch by id**: O(1) average per id (DashMap lookup)
/// - **Save**: O(1) average (record map plus unique index)
/// - **List / count by author**: O(N) scan
///
/// Listing returns records in insertion order; replacing a record keeps its
/// original position.
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    authors: DashMap<AuthorId, Row<Author>>,
    author_names: DashMap<String, AuthorId>,
    books: DashMap<BookId, Row<Book>>,
    book_titles: DashMap<String, BookId>,
    users: DashMap<UserId, Row<User>>,
    usernames: DashMap<String, UserId>,
    next_seq: AtomicU64,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Claims `key` in a unique index for `id`.
///
/// Succeeds when the key is free or already owned by the same record.
fn claim_unique<Id>(
    index: &DashMap<String, Id>,
    key: &str,
    id: Id,
    entity: &'static str,
) -> StorageResult<()>
where
    Id: Copy + Eq + Hash,
{
    match index.entry(key.to_string()) {
        Entry::Occupied(entry) if *entry.get() != id => Err(StorageError::Duplicate {
            entity,
            value: key.to_string(),
        }),
        Entry::Occupied(_) => Ok(()),
        Entry::Vacant(entry) => {
            entry.insert(id);
            Ok(())
        }
    }
}

/// Inserts or replaces a row, keeping the original sequence number.
///
/// Returns the replaced record, if any.
fn upsert<Id, T>(rows: &DashMap<Id, Row<T>>, id: Id, record: T, seq: u64) -> Option<T>
where
    Id: Eq + Hash,
{
    match rows.entry(id) {
        Entry::Occupied(mut entry) => {
            let row = entry.get_mut();
            Some(std::mem::replace(&mut row.record, record))
        }
        Entry::Vacant(entry) => {
            entry.insert(Row { seq, record });
            None
        }
    }
}

/// Collects rows in insertion order.
fn in_order<Id, T, F>(rows: &DashMap<Id, Row<T>>, mut keep: F) -> Vec<T>
where
    Id: Eq + Hash,
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let mut selected: Vec<(u64, T)> = rows
        .iter()
        .filter(|row| keep(&row.record))
        .map(|row| (row.seq, row.record.clone()))
        .collect();
    selected.sort_by_key(|(seq, _)| *seq);
    selected.into_iter().map(|(_, record)| record).collect()
}

#[async_trait]
impl DataStore for MemoryDataStore {
    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn authors_by_ids(&self, ids: &[AuthorId]) -> StorageResult<HashMap<AuthorId, Author>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.authors.get(id).map(|row| (*id, row.record.clone())))
            .collect())
    }

    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn books_by_ids(&self, ids: &[BookId]) -> StorageResult<HashMap<BookId, Book>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.books.get(id).map(|row| (*id, row.record.clone())))
            .collect())
    }

    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn book_counts_by_author(
        &self,
        ids: &[AuthorId],
    ) -> StorageResult<HashMap<AuthorId, usize>> {
        let mut counts: HashMap<AuthorId, usize> = ids.iter().map(|id| (*id, 0)).collect();
        for row in self.books.iter() {
            if let Some(count) = counts.get_mut(&row.record.author) {
                *count += 1;
            }
        }
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn list_books(&self, filter: &BookFilter) -> StorageResult<Vec<Book>> {
        Ok(in_order(&self.books, |book| filter.matches(book)))
    }

    async fn list_authors(&self) -> StorageResult<Vec<Author>> {
        Ok(in_order(&self.authors, |_| true))
    }

    async fn find_author_by_name(&self, name: &str) -> StorageResult<Option<Author>> {
        let Some(id) = self.author_names.get(name).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.authors.get(&id).map(|row| row.record.clone()))
    }

    async fn find_book_by_title(&self, title: &str) -> StorageResult<Option<Book>> {
        let Some(id) = self.book_titles.get(title).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.books.get(&id).map(|row| row.record.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> StorageResult<Option<User>> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|row| row.record.clone()))
    }

    async fn get_user(&self, id: UserId) -> StorageResult<Option<User>> {
        Ok(self.users.get(&id).map(|row| row.record.clone()))
    }

    async fn count_books(&self) -> StorageResult<usize> {
        Ok(self.books.len())
    }

    async fn count_authors(&self) -> StorageResult<usize> {
        Ok(self.authors.len())
    }

    #[instrument(skip(self, author), fields(author_id = %author.id))]
    async fn save_author(&self, author: Author) -> StorageResult<Author> {
        let author = normalize_author(author)?;
        claim_unique(&self.author_names, &author.name, author.id, "author")?;

        let seq = self.seq();
        if let Some(previous) = upsert(&self.authors, author.id, author.clone(), seq) {
            if previous.name != author.name {
                self.author_names
                    .remove_if(&previous.name, |_, owner| *owner == author.id);
            }
        }

        debug!(name = %author.name, "author saved");
        Ok(author)
    }

    #[instrument(skip(self, book), fields(book_id = %book.id))]
    async fn save_book(&self, book: Book) -> StorageResult<Book> {
        let book = normalize_book(book)?;
        if !self.authors.contains_key(&book.author) {
            return Err(StorageError::NotFound {
                entity: "author",
                id: book.author.to_string(),
            });
        }
        claim_unique(&self.book_titles, &book.title, book.id, "book")?;

        let seq = self.seq();
        if let Some(previous) = upsert(&self.books, book.id, book.clone(), seq) {
            if previous.title != book.title {
                self.book_titles
                    .remove_if(&previous.title, |_, owner| *owner == book.id);
            }
        }

        debug!(title = %book.title, "book saved");
        Ok(book)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn save_user(&self, user: User) -> StorageResult<User> {
        let user = normalize_user(user)?;
        claim_unique(&self.usernames, &user.username, user.id, "user")?;

        let seq = self.seq();
        if let Some(previous) = upsert(&self.users, user.id, user.clone(), seq) {
            if previous.username != user.username {
                self.usernames
                    .remove_if(&previous.username, |_, owner| *owner == user.id);
            }
        }

        debug!(username = %user.username, "user saved");
        Ok(user)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // No external dependencies
        Ok(HealthStatus {
            healthy: true,
            backend: "memory",
            message: None,
        })
    }
}
