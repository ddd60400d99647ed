//! The lazily loaded, refreshable value holder.

use crate::error::{BoxError, LoadError};
use crate::key::RefreshKey;
use crate::registry::{Observer, Registry};

use parking_lot::{Mutex, RwLock};
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

type LoaderFn<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// The state shared by every handle to one entry.
struct EntryShared<K, T> {
  id: u64,
  key: K,
  registry: Registry<K>,
  loader: LoaderFn<T>,
  /// `None` until the first successful load; never emptied afterwards.
  value: RwLock<Option<Arc<T>>>,
  reload_needed: AtomicBool,
  load_in_progress: AtomicBool,
  /// Held for the whole of a first load or a reload.
  load_lock: Mutex<()>,
}

impl<K, T> Observer for EntryShared<K, T>
where
  K: RefreshKey,
  T: Send + Sync + 'static,
{
  fn invalidate(&self) {
    self.reload_needed.store(true, Ordering::Release);
  }
}

/// An RAII guard covering one pass through the load critical section.
///
/// Dropping it always clears `load_in_progress` and the reloading-thread
/// marker if this pass set it. If the pass consumed the reload request but
/// did not complete (loader error or panic), the request is re-armed so a
/// later `get()` retries.
struct LoadGuard<'a, K: RefreshKey, T> {
  entry: &'a EntryShared<K, T>,
  marked_loading: bool,
  pending: bool,
}

impl<'a, K: RefreshKey, T> LoadGuard<'a, K, T> {
  fn new(entry: &'a EntryShared<K, T>) -> Self {
    Self {
      entry,
      marked_loading: false,
      pending: false,
    }
  }
}

impl<K: RefreshKey, T> Drop for LoadGuard<'_, K, T> {
  fn drop(&mut self) {
    if self.pending {
      self.entry.reload_needed.store(true, Ordering::Release);
    }
    if self.marked_loading {
      self.entry.registry.unset_thread_loading(&self.entry.key);
    }
    self.entry.load_in_progress.store(false, Ordering::Release);
  }
}

impl<K, T> EntryShared<K, T>
where
  K: RefreshKey,
  T: Send + Sync + 'static,
{
  #[inline]
  fn current(&self) -> Option<Arc<T>> {
    self.value.read().clone()
  }

  /// Performs the first load, unless another thread completed it while this
  /// one waited for the lock.
  fn first_load(&self) -> Result<Arc<T>, LoadError> {
    let _lock = self.load_lock.lock();
    if let Some(value) = self.current() {
      return Ok(value);
    }

    tracing::trace!(key = ?self.key, entry = self.id, "first load");
    let mut guard = LoadGuard::new(self);
    self.reload_needed.store(false, Ordering::Release);
    self.run_loader(&mut guard)
  }

  /// Reloads the value if a reload is still needed once the lock is held.
  ///
  /// Returns `None` when another thread already finished the reload.
  fn load(&self) -> Result<Option<Arc<T>>, LoadError> {
    let _lock = self.load_lock.lock();
    let mut guard = LoadGuard::new(self);

    // Consume the request up front so an invalidation that lands while the
    // loader runs is not lost when the load completes.
    if !self.reload_needed.swap(false, Ordering::AcqRel) {
      tracing::trace!(key = ?self.key, entry = self.id, "reload already completed");
      return Ok(None);
    }

    let value = self.run_loader(&mut guard)?;
    tracing::debug!(key = ?self.key, entry = self.id, "reloaded cached value");
    Ok(Some(value))
  }

  /// Must be called with `load_lock` held and the reload request consumed.
  fn run_loader(&self, guard: &mut LoadGuard<'_, K, T>) -> Result<Arc<T>, LoadError> {
    guard.pending = true;
    guard.marked_loading = self.registry.try_set_thread_loading(&self.key);

    match (self.loader)() {
      Ok(value) => {
        let value = Arc::new(value);
        *self.value.write() = Some(value.clone());
        guard.pending = false;
        Ok(value)
      }
      Err(source) => {
        tracing::warn!(key = ?self.key, entry = self.id, error = %source, "loader failed");
        Err(LoadError::new(source))
      }
    }
  }
}

/// A lazily computed value that can be invalidated through a `Registry`.
///
/// The loader is not invoked at construction; the first `get()` runs it.
/// After `Registry::refresh` is called with the entry's key, the next `get()`
/// runs the loader again. Readers that arrive while another thread is
/// reloading receive the previous value instead of waiting.
///
/// `CachedEntry` is a handle: clones share the same value and state.
pub struct CachedEntry<K, T> {
  shared: Arc<EntryShared<K, T>>,
}

impl<K, T> Clone for CachedEntry<K, T> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K, T> fmt::Debug for CachedEntry<K, T>
where
  K: RefreshKey,
  T: fmt::Debug,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CachedEntry")
      .field("key", &self.shared.key)
      .field("value", &*self.shared.value.read())
      .field(
        "reload_needed",
        &self.shared.reload_needed.load(Ordering::Relaxed),
      )
      .finish_non_exhaustive()
  }
}

impl<K, T> CachedEntry<K, T>
where
  K: RefreshKey,
  T: Send + Sync + 'static,
{
  /// Creates an entry with an infallible loader and registers it under `key`.
  pub fn new<F>(registry: &Registry<K>, key: K, loader: F) -> Self
  where
    F: Fn() -> T + Send + Sync + 'static,
  {
    Self::try_new(registry, key, move || Ok::<T, Infallible>(loader()))
  }

  /// Creates an entry whose loader may fail and registers it under `key`.
  ///
  /// Loader errors are returned from the `get()` call that triggered the load.
  pub fn try_new<F, E>(registry: &Registry<K>, key: K, loader: F) -> Self
  where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
  {
    let shared = Arc::new(EntryShared {
      id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
      key: key.clone(),
      registry: registry.clone(),
      loader: Box::new(move || loader().map_err(Into::into)),
      value: RwLock::new(None),
      reload_needed: AtomicBool::new(true),
      load_in_progress: AtomicBool::new(false),
      load_lock: Mutex::new(()),
    });
    let entry = Self { shared };
    registry.register(key, &entry);
    entry
  }

  /// Returns the current value, loading or reloading it first if needed.
  ///
  /// Never waits for a reload started by another thread: if one is in
  /// flight, the previous value is returned. Blocks only while racing for the
  /// very first load, or when re-entering a reload for this entry's key from
  /// the thread that owns it.
  pub fn get(&self) -> Result<Arc<T>, LoadError> {
    let shared = &*self.shared;

    let value = match shared.current() {
      Some(value) => value,
      None => shared.first_load()?,
    };

    if !shared.reload_needed.load(Ordering::Acquire) {
      return Ok(value);
    }

    let won = shared
      .load_in_progress
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok();

    if won || shared.registry.is_loading_thread(&shared.key) {
      if !won {
        tracing::trace!(key = ?shared.key, entry = shared.id, "reentrant reload");
      }
      return Ok(shared.load()?.or_else(|| shared.current()).unwrap_or(value));
    }

    tracing::trace!(
      key = ?shared.key,
      entry = shared.id,
      "reload in flight elsewhere, serving stale value"
    );
    Ok(value)
  }

  /// Returns the current value without triggering a load.
  pub fn peek(&self) -> Option<Arc<T>> {
    self.shared.current()
  }

  /// Returns `true` once a load has succeeded.
  pub fn is_loaded(&self) -> bool {
    self.shared.value.read().is_some()
  }

  /// Returns `true` if the next `get()` will try to recompute the value.
  ///
  /// The request is consumed when a reload starts, so this reports `false`
  /// while that reload is in flight. A refresh landing during the reload
  /// sets it again, and a failed or panicked reload re-arms it.
  pub fn needs_reload(&self) -> bool {
    self.shared.reload_needed.load(Ordering::Acquire)
  }

  /// The key this entry was registered under at construction.
  pub fn key(&self) -> &K {
    &self.shared.key
  }

  /// The registry this entry was registered with at construction.
  pub fn registry(&self) -> &Registry<K> {
    &self.shared.registry
  }

  /// Removes this entry from its registry; later refreshes of its key no
  /// longer reach it.
  pub fn unregister(&self) {
    self.shared.registry.unregister(&self.shared.key, self);
  }

  pub(crate) fn id(&self) -> u64 {
    self.shared.id
  }

  pub(crate) fn observer(&self) -> Weak<dyn Observer> {
    let observer: Arc<dyn Observer> = self.shared.clone();
    Arc::downgrade(&observer)
  }
}
