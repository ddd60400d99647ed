use std::fmt::Debug;
use std::hash::Hash;

/// Bounds shared by every key used to group entries in a `Registry`.
///
/// Keys are compared by equality and hash only; they carry no content
/// semantics. This trait is implemented for every type that satisfies the
/// bounds, so it never needs to be implemented by hand.
pub trait RefreshKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> RefreshKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}
