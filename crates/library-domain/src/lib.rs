//! library-domain: request-scoped data loading and event fan-out
//!
//! This crate contains the two concurrency primitives the library service is
//! built on:
//! - Batch loaders that coalesce per-key lookups into bulk fetches
//! - A topic-based event bus that feeds live subscriptions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               library-domain                │
//! ├─────────────────────────────────────────────┤
//! │  loader/  - Batching, dedup, per-op cache   │
//! │  pubsub/  - Topics, subscriptions, fan-out  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod loader;
pub mod pubsub;

// Re-export commonly used types at the crate root
pub use loader::{BatchFn, BatchLoader, LoadError, LoadResult, LoaderConfig};
pub use pubsub::{EventBus, Subscription, SubscriptionHandle};
