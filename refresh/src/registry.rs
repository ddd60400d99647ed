//! The key-indexed observer registry.

use crate::builder::RegistryBuilder;
use crate::entry::CachedEntry;
use crate::key::RefreshKey;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Something the registry can mark as needing a reload.
pub(crate) trait Observer: Send + Sync {
  fn invalidate(&self);
}

/// A non-owning association between a key and one registered entry.
pub(crate) struct ObserverHandle {
  id: u64,
  target: Weak<dyn Observer>,
}

impl ObserverHandle {
  fn is_live(&self) -> bool {
    self.target.strong_count() > 0
  }
}

pub(crate) struct RegistryShared<K> {
  /// Entries registered under each key. The shard lock guarding a key's list
  /// is the critical section `refresh` runs in.
  observers: DashMap<K, Vec<ObserverHandle>>,
  /// The thread currently holding the reloading role for each key.
  loading: DashMap<K, ThreadId>,
}

/// Maps keys to the `CachedEntry` values registered under them.
///
/// `refresh(&key)` marks every entry under `key` for reload; the next `get()`
/// on each entry recomputes its value. The registry also tracks, per key,
/// which thread is currently reloading, so a loader that reads another entry
/// under the same key can reload it in place instead of deadlocking.
///
/// `Registry` is a cheap handle: clones share the same underlying maps. It
/// holds only weak references to entries and never keeps them alive.
pub struct Registry<K> {
  shared: Arc<RegistryShared<K>>,
}

impl<K> Clone for Registry<K> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K: RefreshKey> Default for Registry<K> {
  fn default() -> Self {
    Self::from_maps(DashMap::new(), DashMap::new())
  }
}

impl<K: RefreshKey> fmt::Debug for Registry<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("keys", &self.shared.observers.len())
      .field("loading", &self.shared.loading.len())
      .finish()
  }
}

impl<K: RefreshKey> Registry<K> {
  /// Creates a new, empty `Registry` with default settings.
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns a builder for configuring the registry's internal maps.
  pub fn builder() -> RegistryBuilder<K> {
    RegistryBuilder::new()
  }

  pub(crate) fn from_maps(
    observers: DashMap<K, Vec<ObserverHandle>>,
    loading: DashMap<K, ThreadId>,
  ) -> Self {
    Self {
      shared: Arc::new(RegistryShared { observers, loading }),
    }
  }

  // --- Registration ---

  /// Registers `entry` under `key`.
  ///
  /// Registering the same entry twice under one key is allowed; it is then
  /// invalidated twice per refresh, which has no extra effect.
  pub fn register<T>(&self, key: K, entry: &CachedEntry<K, T>)
  where
    T: Send + Sync + 'static,
  {
    self.register_observer(key, entry.id(), entry.observer());
  }

  pub(crate) fn register_observer(&self, key: K, id: u64, target: Weak<dyn Observer>) {
    self
      .shared
      .observers
      .entry(key)
      .or_default()
      .push(ObserverHandle { id, target });
  }

  /// Removes `entry` from the entries registered under `key`, dropping the
  /// key itself once no entries remain under it.
  ///
  /// Does nothing if the entry is not registered under `key`.
  pub fn unregister<T>(&self, key: &K, entry: &CachedEntry<K, T>)
  where
    T: Send + Sync + 'static,
  {
    let Some(mut observers) = self.shared.observers.get_mut(key) else {
      return;
    };
    let id = entry.id();
    observers.retain(|observer| observer.id != id);
    let emptied = observers.is_empty();
    // The shard guard must be released before `remove_if` re-locks it.
    drop(observers);
    if emptied {
      self
        .shared
        .observers
        .remove_if(key, |_, observers| observers.is_empty());
    }
  }

  /// Drops every association for `key`.
  ///
  /// The entries themselves are untouched; they simply stop receiving
  /// refreshes through this key.
  pub fn remove_key(&self, key: &K) {
    if let Some((_, observers)) = self.shared.observers.remove(key) {
      tracing::debug!(key = ?key, entries = observers.len(), "removed key from registry");
    }
  }

  // --- Invalidation ---

  /// Marks every entry registered under `key` as needing a reload, and
  /// returns how many entries were marked.
  ///
  /// This only flips flags: it never waits for a loader. Refreshing a key
  /// with no registered entries is a no-op. Associations whose entry has
  /// been dropped are pruned along the way, and the key is dropped once it
  /// has none left.
  pub fn refresh(&self, key: &K) -> usize {
    let Some(mut observers) = self.shared.observers.get_mut(key) else {
      tracing::trace!(key = ?key, "refresh of unknown key ignored");
      return 0;
    };

    let mut invalidated = 0;
    observers.retain(|observer| match observer.target.upgrade() {
      Some(target) => {
        target.invalidate();
        invalidated += 1;
        true
      }
      None => false,
    });
    let emptied = observers.is_empty();
    drop(observers);
    if emptied {
      self
        .shared
        .observers
        .remove_if(key, |_, observers| observers.is_empty());
    }

    tracing::debug!(key = ?key, invalidated, "refreshed key");
    invalidated
  }

  /// Refreshes every key currently known to the registry, returning the
  /// total number of entries marked.
  pub fn refresh_all(&self) -> usize {
    // Collect first: refreshing while iterating would re-lock a held shard.
    let keys: Vec<K> = self
      .shared
      .observers
      .iter()
      .map(|item| item.key().clone())
      .collect();
    keys.iter().map(|key| self.refresh(key)).sum()
  }

  // --- Introspection ---

  /// Returns `true` if any association exists for `key`.
  pub fn contains_key(&self, key: &K) -> bool {
    self.shared.observers.contains_key(key)
  }

  /// Returns the number of live entries registered under `key`.
  pub fn entry_count(&self, key: &K) -> usize {
    self
      .shared
      .observers
      .get(key)
      .map_or(0, |observers| observers.iter().filter(|o| o.is_live()).count())
  }

  /// Returns the number of keys with an association list.
  pub fn key_count(&self) -> usize {
    self.shared.observers.len()
  }

  // --- Reloading-thread marker ---

  /// Marks the calling thread as the one reloading `key`, unless another
  /// marker is already set. Returns whether the marker was set by this call.
  pub fn try_set_thread_loading(&self, key: &K) -> bool {
    match self.shared.loading.entry(key.clone()) {
      Entry::Occupied(_) => false,
      Entry::Vacant(slot) => {
        slot.insert(thread::current().id());
        true
      }
    }
  }

  /// Clears the reloading-thread marker for `key`.
  pub fn unset_thread_loading(&self, key: &K) {
    self.shared.loading.remove(key);
  }

  /// Returns `true` if the calling thread is the one marked as reloading `key`.
  pub fn is_loading_thread(&self, key: &K) -> bool {
    self
      .shared
      .loading
      .get(key)
      .is_some_and(|owner| *owner == thread::current().id())
  }
}
