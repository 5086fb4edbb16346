//! Request-scoped batch loading.
//!
//! A [`BatchLoader`] turns many independent "fetch by key" calls made while
//! resolving one operation into as few bulk fetches as possible:
//!
//! 1. **Coalescing**: every `load` issued before the operation next yields to
//!    the scheduler joins the same batch.
//! 2. **Deduplication**: the batch function sees each distinct key once.
//! 3. **Caching**: a key resolved (or pending) in this loader is never fetched
//!    again by the same loader.
//!
//! # Batch lifecycle
//!
//! ```text
//! load(k1) ──┐                       ┌──► slot(k1) = v1
//! load(k2) ──┼──► open batch ──tick──┼──► BatchFn::load([k1, k2]) ──► slot(k2) = v2
//! load(k1) ──┘   (cache hit for k1)  └──► missing keys resolve to None
//! ```
//!
//! A loader is owned by one request context and dropped with it; nothing in
//! this module is process-wide.

mod batch;
mod batch_loader;
mod types;

pub use batch_loader::{BatchFn, BatchLoader};
pub use types::{LoadError, LoadResult, LoaderConfig};
