use crate::error::BuildError;
use crate::key::RefreshKey;
use crate::registry::Registry;

use dashmap::DashMap;
use std::fmt;
use std::marker::PhantomData;

/// A builder for creating `Registry` instances.
pub struct RegistryBuilder<K> {
  shards: Option<usize>,
  capacity: usize,
  _key_marker: PhantomData<K>,
}

impl<K> fmt::Debug for RegistryBuilder<K> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistryBuilder")
      .field("shards", &self.shards)
      .field("capacity", &self.capacity)
      .finish()
  }
}

impl<K: RefreshKey> Default for RegistryBuilder<K> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: RefreshKey> RegistryBuilder<K> {
  /// Creates a builder with the concurrent map's default shard amount and no
  /// pre-allocated capacity.
  pub fn new() -> Self {
    Self {
      shards: None,
      capacity: 0,
      _key_marker: PhantomData,
    }
  }

  /// Sets the number of shards the key maps are split into.
  ///
  /// The value is rounded up to the next power of two. Operations on keys in
  /// different shards never contend with each other.
  pub fn shards(mut self, shards: usize) -> Self {
    // Zero is kept for `build` to reject on overflow.
    self.shards = Some(shards.max(1).checked_next_power_of_two().unwrap_or(0));
    self
  }

  /// Pre-sizes the key maps for roughly `capacity` distinct keys.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Builds the `Registry`.
  pub fn build(self) -> Result<Registry<K>, BuildError> {
    match self.shards {
      None => Ok(Registry::from_maps(
        DashMap::with_capacity(self.capacity),
        DashMap::with_capacity(self.capacity),
      )),
      Some(shards) if shards > 1 && shards.is_power_of_two() => Ok(Registry::from_maps(
        DashMap::with_capacity_and_shard_amount(self.capacity, shards),
        DashMap::with_capacity_and_shard_amount(self.capacity, shards),
      )),
      Some(shards) => Err(BuildError::InvalidShardAmount(shards)),
    }
  }
}
