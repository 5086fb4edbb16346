//! library-storage: Storage abstraction layer
//!
//! This crate provides the persistence boundary for the library API:
//! - Author, book and user records with typed ids
//! - DataStore trait, including the fetch-many calls batch loaders use
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              library-storage                │
//! ├─────────────────────────────────────────────┤
//! │  records.rs - Author, Book, User, ids       │
//! │  traits.rs  - DataStore trait definition    │
//! │  memory.rs  - In-memory implementation      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod records;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use records::{Author, AuthorId, Book, BookId, User, UserId};
pub use traits::{BookFilter, DataStore, HealthStatus};
