//! Configuration and error types for batch loaders.

use std::time::Duration;

/// Configuration for a [`BatchLoader`](super::BatchLoader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of distinct keys in one bulk fetch.
    ///
    /// `None` (the default) never splits a batch. With `Some(n)`, a batch that
    /// reaches `n` keys is dispatched immediately and later keys go into a
    /// fresh batch. `Some(0)` is treated as `Some(1)`.
    pub max_batch_size: Option<usize>,
    /// Optional debounce window.
    ///
    /// `None` closes the batch window once a waiting caller has yielded to the
    /// scheduler a single time, so every load issued before the caller's next
    /// suspension point lands in the batch. `Some(delay)` keeps the window
    /// open for `delay` instead, which also coalesces loads issued by other
    /// tasks in the meantime.
    pub batch_delay: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            batch_delay: None,
        }
    }
}

impl LoaderConfig {
    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Sets the debounce window.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }
}

/// Errors delivered to callers of [`BatchLoader::load`](super::BatchLoader::load).
///
/// A key that the batch function did not return is *not* an error; it resolves
/// to `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The batch function failed. Every key of that batch receives this error.
    #[error("batch fetch failed in loader '{loader}': {message}")]
    Fetch {
        loader: &'static str,
        message: String,
    },

    /// The batch was dropped without resolving the slot.
    #[error("batch in loader '{loader}' was dropped before it resolved")]
    Dropped { loader: &'static str },
}

impl LoadError {
    /// Returns a short stable label for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::Fetch { .. } => "loader_fetch_failed",
            LoadError::Dropped { .. } => "loader_dropped",
        }
    }
}

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;
