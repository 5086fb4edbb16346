//! Batch window bookkeeping: the open batch and the per-operation cache.

use std::collections::HashMap;
use std::hash::Hash;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use super::types::LoadResult;

/// What a result-slot eventually holds.
pub(crate) type SlotValue<V> = LoadResult<Option<V>>;

/// Single-assignment result holder. Cloned for every caller of the same key.
pub(crate) type Slot<V> = Shared<oneshot::Receiver<SlotValue<V>>>;

/// Batch id used for primed entries; real batches start at 1.
const PRIMED: u64 = 0;

/// Cached slot plus the batch that will resolve it.
struct CacheEntry<V> {
    batch_id: u64,
    slot: Slot<V>,
}

/// Keys accumulated since the batch window opened.
///
/// Keys are kept in first-request order so the batch function sees a
/// deterministic key list. Every key appears once; each key may carry several
/// senders if it was cleared and re-requested inside the same window.
pub(crate) struct PendingBatch<K, V> {
    pub(crate) id: u64,
    index: HashMap<K, usize>,
    pub(crate) entries: Vec<(K, Vec<oneshot::Sender<SlotValue<V>>>)>,
}

impl<K, V> PendingBatch<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new(id: u64) -> Self {
        Self {
            id,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn push(&mut self, key: K, sender: oneshot::Sender<SlotValue<V>>) {
        match self.index.get(&key) {
            Some(&position) => self.entries[position].1.push(sender),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, vec![sender]));
            }
        }
    }

    /// Number of distinct keys in the batch.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Distinct keys in first-request order.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

/// Outcome of registering a key in the loader state.
pub(crate) struct Enqueued<V> {
    pub(crate) slot: Slot<V>,
    /// Open batch that will resolve the slot. `None` once that batch is
    /// closed or when the entry was primed.
    pub(crate) batch_id: Option<u64>,
    /// The key was already cached or pending.
    pub(crate) hit: bool,
}

/// Mutable loader state guarded by the loader mutex.
pub(crate) struct LoaderState<K, V> {
    cache: HashMap<K, CacheEntry<V>>,
    pending: Option<PendingBatch<K, V>>,
    /// Batches that filled up and wait for a caller to dispatch them.
    full: Vec<PendingBatch<K, V>>,
    next_batch_id: u64,
}

impl<K, V> Default for LoaderState<K, V> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            pending: None,
            full: Vec::new(),
            next_batch_id: PRIMED + 1,
        }
    }
}

impl<K, V> LoaderState<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Returns the cached slot for `key` or registers a new pending request.
    pub(crate) fn enqueue(&mut self, key: K, max_batch_size: Option<usize>) -> Enqueued<V> {
        if let Some(entry) = self.cache.get(&key) {
            let open = self
                .pending
                .as_ref()
                .is_some_and(|batch| batch.id == entry.batch_id);
            return Enqueued {
                slot: entry.slot.clone(),
                batch_id: open.then_some(entry.batch_id),
                hit: true,
            };
        }

        let next_batch_id = &mut self.next_batch_id;
        let batch = self.pending.get_or_insert_with(|| {
            let id = *next_batch_id;
            *next_batch_id += 1;
            PendingBatch::new(id)
        });

        let (sender, receiver) = oneshot::channel();
        let slot = receiver.shared();
        batch.push(key.clone(), sender);
        let batch_id = batch.id;
        let is_full = max_batch_size.is_some_and(|max| batch.len() >= max.max(1));

        self.cache.insert(
            key,
            CacheEntry {
                batch_id,
                slot: slot.clone(),
            },
        );

        if is_full {
            self.full.extend(self.pending.take());
        }

        Enqueued {
            slot,
            batch_id: (!is_full).then_some(batch_id),
            hit: false,
        }
    }

    /// Removes every batch that filled up since the last call.
    pub(crate) fn take_full(&mut self) -> Vec<PendingBatch<K, V>> {
        std::mem::take(&mut self.full)
    }

    /// Closes the open batch if it is still the one identified by `id`.
    ///
    /// Returns `None` when that batch was already taken, either by another
    /// caller or because it filled up before its window elapsed.
    pub(crate) fn take_batch(&mut self, id: u64) -> Option<PendingBatch<K, V>> {
        match &self.pending {
            Some(batch) if batch.id == id => self.pending.take(),
            _ => None,
        }
    }

    /// Removes cache entries still owned by a failed batch.
    ///
    /// Entries that were cleared and re-requested since belong to a newer
    /// batch and are left alone.
    pub(crate) fn evict_failed(&mut self, batch_id: u64, keys: &[K]) {
        for key in keys {
            if self
                .cache
                .get(key)
                .is_some_and(|entry| entry.batch_id == batch_id)
            {
                self.cache.remove(key);
            }
        }
    }

    /// Seeds the cache with a resolved value unless the key is already present.
    pub(crate) fn prime(&mut self, key: K, value: V) -> bool {
        if self.cache.contains_key(&key) {
            return false;
        }
        let (sender, receiver) = oneshot::channel();
        sender.send(Ok(Some(value))).ok();
        self.cache.insert(
            key,
            CacheEntry {
                batch_id: PRIMED,
                slot: receiver.shared(),
            },
        );
        true
    }

    pub(crate) fn clear(&mut self, key: &K) -> bool {
        self.cache.remove(key).is_some()
    }

    pub(crate) fn clear_all(&mut self) {
        self.cache.clear();
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    pub(crate) fn cached_len(&self) -> usize {
        self.cache.len()
    }
}
