//! library-server: Request contexts and resolvers
//!
//! This crate contains the business logic layer including:
//! - Request contexts owning one batch loader per key kind
//! - Query, mutation and subscription resolvers
//! - Identity resolution and sessions
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               library-server                │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  library.rs  - Shared services              │
//! │  context.rs  - Per-operation loaders        │
//! │  auth.rs     - Identity and sessions        │
//! │  events.rs   - Bus topics and payloads      │
//! │  handlers/   - Resolvers                    │
//! │    queries.rs       - Reads                 │
//! │    mutations.rs     - Writes + publish      │
//! │    subscriptions.rs - Live streams          │
//! └─────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod handlers;
pub mod library;

// Re-exports for convenience
pub use auth::{IdentityProvider, SessionStore, Token};
pub use config::{ConfigLoadError, ServerConfig};
pub use context::RequestContext;
pub use error::{LibraryError, LibraryResult};
pub use events::{LibraryBus, LibraryEvent, AUTHOR_ADDED, BOOK_ADDED};
pub use library::Library;
