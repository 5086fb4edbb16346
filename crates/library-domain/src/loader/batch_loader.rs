//! The batch loader and its batch function seam.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::batch::{Enqueued, LoaderState, PendingBatch};
use super::types::{LoadError, LoadResult, LoaderConfig};

/// Bulk fetch used by a [`BatchLoader`].
///
/// Receives each distinct key of a batch exactly once. Keys missing from the
/// returned map resolve to `None` for their callers.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync + 'static
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    /// Error reported when the whole fetch fails.
    type Error: fmt::Display + Send;

    /// Fetches values for `keys`.
    async fn load(&self, keys: &[K]) -> Result<HashMap<K, V>, Self::Error>;
}

struct Inner<K, V, F> {
    name: &'static str,
    config: LoaderConfig,
    batch_fn: F,
    state: Mutex<LoaderState<K, V>>,
}

/// Coalesces individual key lookups into bulk fetches and caches the results.
///
/// Every [`load`](Self::load) issued before the current task next yields to
/// the scheduler lands in the same batch; the batch function is then called
/// once with the distinct keys. Results are cached for the lifetime of the
/// loader, which is meant to be one inbound operation.
///
/// Cloning a loader shares its cache and open batch.
///
/// # Example
///
/// ```rust,ignore
/// let loader = BatchLoader::new("author_by_id", AuthorBatch::new(store));
/// let (a, b, c) = tokio::join!(loader.load(1), loader.load(2), loader.load(1));
/// // one call to AuthorBatch::load with [1, 2]
/// ```
pub struct BatchLoader<K, V, F> {
    inner: Arc<Inner<K, V, F>>,
}

impl<K, V, F> Clone for BatchLoader<K, V, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, F> fmt::Debug for BatchLoader<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLoader")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<K, V, F> BatchLoader<K, V, F>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    /// Creates a loader with the default configuration.
    pub fn new(name: &'static str, batch_fn: F) -> Self {
        Self::with_config(name, batch_fn, LoaderConfig::default())
    }

    /// Creates a loader with a custom configuration.
    pub fn with_config(name: &'static str, batch_fn: F, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                config,
                batch_fn,
                state: Mutex::new(LoaderState::default()),
            }),
        }
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Looks up a single key.
    ///
    /// The key is registered when this method is called, not when the returned
    /// future is first polled, so a burst of calls made without awaiting in
    /// between is always fetched together. The batch window closes once a
    /// waiting caller has yielded to the scheduler, so it always sits on the
    /// caller's side of the burst whichever worker thread runs the caller.
    ///
    /// Resolves to `Ok(None)` when the batch function returned no value for
    /// the key. The returned future must be polled within a Tokio runtime.
    pub fn load(&self, key: K) -> impl Future<Output = LoadResult<Option<V>>> + Send + 'static {
        let Enqueued { slot, batch_id, .. } = self.register(key);
        let inner = Arc::clone(&self.inner);
        async move {
            spawn_batches(&inner, None);
            if let Some(batch_id) = batch_id {
                match inner.config.batch_delay {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => tokio::task::yield_now().await,
                }
                spawn_batches(&inner, Some(batch_id));
            }
            slot.await
                .unwrap_or_else(|_| Err(LoadError::Dropped { loader: inner.name }))
        }
    }

    /// Looks up several keys; results come back in input order.
    ///
    /// Each key resolves independently, so one missing key never shifts the
    /// positions of the others.
    pub fn load_many<I>(
        &self,
        keys: I,
    ) -> impl Future<Output = Vec<LoadResult<Option<V>>>> + Send + 'static
    where
        I: IntoIterator<Item = K>,
    {
        let loads: Vec<_> = keys.into_iter().map(|key| self.load(key)).collect();
        join_all(loads)
    }

    /// Seeds the cache with a value that is already known.
    ///
    /// Returns `false` and leaves the cache untouched if the key is already
    /// cached or pending.
    pub fn prime(&self, key: K, value: V) -> bool {
        self.inner.state.lock().prime(key, value)
    }

    /// Evicts one key so the next load fetches it again.
    pub fn clear(&self, key: &K) -> bool {
        self.inner.state.lock().clear(key)
    }

    /// Evicts every cached key.
    pub fn clear_all(&self) {
        self.inner.state.lock().clear_all();
    }

    /// Returns `true` if `key` has a cached or pending slot.
    pub fn is_cached(&self, key: &K) -> bool {
        self.inner.state.lock().contains(key)
    }

    /// Number of cached or pending keys.
    pub fn cached_len(&self) -> usize {
        self.inner.state.lock().cached_len()
    }

    fn register(&self, key: K) -> Enqueued<V> {
        let enqueued = self
            .inner
            .state
            .lock()
            .enqueue(key, self.inner.config.max_batch_size);

        if enqueued.hit {
            metrics::counter!("library_loader_cache_hits_total", "loader" => self.inner.name)
                .increment(1);
        }
        enqueued
    }
}

/// Dispatches every full batch, plus the open batch `batch_id` if it is still
/// open.
fn spawn_batches<K, V, F>(inner: &Arc<Inner<K, V, F>>, batch_id: Option<u64>)
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    let batches = {
        let mut state = inner.state.lock();
        let mut batches = state.take_full();
        if let Some(id) = batch_id {
            batches.extend(state.take_batch(id));
        }
        batches
    };

    for batch in batches {
        tokio::spawn(dispatch(Arc::clone(inner), batch));
    }
}

/// Runs the batch function once and resolves every slot of the batch.
///
/// Runs on its own task: a caller that stops waiting does not cancel the
/// fetch, it only stops observing the result.
async fn dispatch<K, V, F>(inner: Arc<Inner<K, V, F>>, batch: PendingBatch<K, V>)
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: BatchFn<K, V>,
{
    let loader = inner.name;
    let keys = batch.keys();
    if keys.is_empty() {
        return;
    }

    debug!(loader, batch_id = batch.id, keys = keys.len(), "dispatching batch");
    metrics::counter!("library_loader_batches_total", "loader" => loader).increment(1);
    metrics::counter!("library_loader_keys_total", "loader" => loader)
        .increment(keys.len() as u64);

    match inner.batch_fn.load(&keys).await {
        Ok(mut values) => {
            for (key, senders) in batch.entries {
                let value = values.remove(&key);
                for sender in senders {
                    sender.send(Ok(value.clone())).ok();
                }
            }
        }
        Err(err) => {
            let error = LoadError::Fetch {
                loader,
                message: err.to_string(),
            };
            warn!(loader, batch_id = batch.id, error = %error, "batch fetch failed");

            // Evict before resolving so a caller reacting to the error starts
            // a fresh batch instead of hitting the failed slot.
            inner.state.lock().evict_failed(batch.id, &keys);

            for (_, senders) in batch.entries {
                for sender in senders {
                    sender.send(Err(error.clone())).ok();
                }
            }
        }
    }
}
