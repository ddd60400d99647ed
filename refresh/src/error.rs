use std::error::Error as StdError;

/// The boxed error type loaders report failures with.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur when building a `Registry`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
  /// The registry was configured with a shard amount that the underlying
  /// concurrent map cannot use. It must be a power of two greater than one.
  #[error("shard amount must be a power of two greater than one, got {0}")]
  InvalidShardAmount(usize),
}

/// The loader of a `CachedEntry` failed.
///
/// The entry keeps its previous value (if it had one) and stays marked for
/// reload, so the next `get()` tries again.
#[derive(Debug, thiserror::Error)]
#[error("failed to load cached value: {source}")]
pub struct LoadError {
  #[source]
  source: BoxError,
}

impl LoadError {
  pub(crate) fn new(source: impl Into<BoxError>) -> Self {
    Self {
      source: source.into(),
    }
  }

  /// Returns the error the loader produced.
  pub fn into_inner(self) -> BoxError {
    self.source
  }

  /// Attempts to view the loader's error as a concrete type.
  pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
    self.source.downcast_ref::<E>()
  }
}
