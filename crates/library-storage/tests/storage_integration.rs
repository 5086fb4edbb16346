//! Storage Integration Tests.
//!
//! These tests drive `MemoryDataStore` through the `DataStore` trait object
//! the server holds, covering the fetch-many calls batch loaders depend on.

use std::sync::Arc;

use library_storage::{Author, Book, BookFilter, DataStore, MemoryDataStore, StorageError, User};

/// Create a store behind the trait object used by the server.
fn create_store() -> Arc<dyn DataStore> {
    Arc::new(MemoryDataStore::new())
}

/// Helper function to seed a small library.
async fn seed(store: &dyn DataStore) -> (Author, Author) {
    let martin = store
        .save_author(Author::new("Robert Martin", Some(1952)))
        .await
        .unwrap();
    let fowler = store
        .save_author(Author::new("Martin Fowler", Some(1963)))
        .await
        .unwrap();

    for (title, author, genres) in [
        ("Clean Code", &martin, vec!["refactoring"]),
        ("Agile software development", &martin, vec!["agile", "patterns", "design"]),
        ("Refactoring, edition 2", &fowler, vec!["refactoring"]),
    ] {
        store
            .save_book(Book::new(
                title,
                2008,
                author.id,
                genres.into_iter().map(String::from).collect(),
            ))
            .await
            .unwrap();
    }

    (martin, fowler)
}

#[tokio::test]
async fn test_fetch_many_round_trip_through_trait_object() {
    let store = create_store();
    let (martin, fowler) = seed(store.as_ref()).await;

    let authors = store.authors_by_ids(&[fowler.id, martin.id]).await.unwrap();
    assert_eq!(authors.len(), 2);

    let counts = store
        .book_counts_by_author(&[martin.id, fowler.id])
        .await
        .unwrap();
    assert_eq!(counts[&martin.id], 2);
    assert_eq!(counts[&fowler.id], 1);

    let books = store.list_books(&BookFilter::default()).await.unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id).collect();
    let fetched = store.books_by_ids(&ids).await.unwrap();
    assert_eq!(fetched.len(), 3);
}

#[tokio::test]
async fn test_filters_combine() {
    let store = create_store();
    let (martin, _) = seed(store.as_ref()).await;

    let filter = BookFilter {
        author: Some(martin.id),
        genre: Some("refactoring".to_string()),
    };
    let books = store.list_books(&filter).await.unwrap();

    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Clean Code");
}

#[tokio::test]
async fn test_counts_track_saves() {
    let store = create_store();
    seed(store.as_ref()).await;

    assert_eq!(store.count_authors().await.unwrap(), 2);
    assert_eq!(store.count_books().await.unwrap(), 3);

    let err = store
        .save_book(Book::new("Clean Code", 2009, Author::new("Nobody Here", None).id, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
    assert_eq!(store.count_books().await.unwrap(), 3);
}

#[tokio::test]
async fn test_user_lifecycle() {
    let store = create_store();
    let user = store
        .save_user(User::new("mluukkai", "refactoring"))
        .await
        .unwrap();

    assert_eq!(store.get_user(user.id).await.unwrap(), Some(user.clone()));
    assert_eq!(
        store.find_user_by_username("mluukkai").await.unwrap(),
        Some(user)
    );
}
