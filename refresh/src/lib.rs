//! # Fibre Refresh
//!
//! Lazily computed, refreshable cached values that can be invalidated in
//! groups by key.
//!
//! ## Core Concepts
//!
//! - **CachedEntry**: holds one value computed on first access by a
//!   user-supplied loader. It registers itself with a `Registry` under a key
//!   when it is created.
//! - **Registry**: maps keys to entries. `refresh(&key)` marks every entry
//!   under `key` so that its next `get()` recomputes the value.
//! - **Stale reads**: while one thread reloads an entry, other readers get
//!   the previous value immediately instead of waiting.
//! - **Reentrant reloads**: a loader may read other entries registered under
//!   the same key; the reloading thread reloads them in place without
//!   deadlocking.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_refresh::{CachedEntry, Registry};
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let generation = Arc::new(AtomicU32::new(0));
//!
//! let settings = CachedEntry::new(&registry, "settings", {
//!   let generation = generation.clone();
//!   move || format!("settings v{}", generation.fetch_add(1, Ordering::SeqCst))
//! });
//!
//! assert_eq!(*settings.get().unwrap(), "settings v0");
//! assert_eq!(*settings.get().unwrap(), "settings v0");
//!
//! // Invalidate everything registered under "settings".
//! registry.refresh(&"settings");
//! assert_eq!(*settings.get().unwrap(), "settings v1");
//! ```

pub mod builder;
pub mod error;

mod entry;
mod key;
mod registry;

pub use builder::RegistryBuilder;
pub use entry::CachedEntry;
pub use error::{BoxError, BuildError, LoadError};
pub use key::RefreshKey;
pub use registry::Registry;
