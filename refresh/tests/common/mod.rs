#![allow(dead_code)]

use fibre_refresh::{CachedEntry, Registry, RefreshKey};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::Duration;

/// A loader that returns how many times it has been called before, starting
/// at zero, optionally sleeping first to simulate a slow computation.
#[derive(Clone, Default)]
pub struct CountingLoader {
  pub calls: Arc<AtomicUsize>,
  pub delay: Option<Duration>,
}

impl CountingLoader {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn slow(delay: Duration) -> Self {
    Self {
      calls: Arc::new(AtomicUsize::new(0)),
      delay: Some(delay),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn entry<K: RefreshKey>(&self, registry: &Registry<K>, key: K) -> CachedEntry<K, usize> {
    let loader = self.clone();
    CachedEntry::new(registry, key, move || {
      if let Some(delay) = loader.delay {
        thread::sleep(delay);
      }
      loader.calls.fetch_add(1, Ordering::SeqCst)
    })
  }
}
