mod common;

use common::CountingLoader;
use fibre_refresh::{BuildError, Registry};

#[test]
fn test_unregister_stops_future_refresh() {
  let registry = Registry::new();
  let loader = CountingLoader::new();
  let entry = loader.entry(&registry, "config");
  let other = CountingLoader::new().entry(&registry, "config");
  entry.get().unwrap();
  other.get().unwrap();

  registry.unregister(&"config", &entry);
  assert_eq!(registry.refresh(&"config"), 1);

  assert!(!entry.needs_reload(), "Unregistered entry must not be marked");
  assert!(other.needs_reload());
  assert_eq!(*entry.get().unwrap(), 0);
  assert_eq!(loader.calls(), 1);
}

#[test]
fn test_unregister_absent_entry_is_noop() {
  let registry = Registry::new();
  let entry = CountingLoader::new().entry(&registry, "a");

  registry.unregister(&"b", &entry);
  registry.unregister(&"a", &entry);
  registry.unregister(&"a", &entry);

  assert_eq!(registry.entry_count(&"a"), 0);
  assert_eq!(registry.refresh(&"a"), 0);
}

#[test]
fn test_unregister_last_entry_drops_key() {
  let registry = Registry::new();
  let first = CountingLoader::new().entry(&registry, "group");
  let second = CountingLoader::new().entry(&registry, "group");
  let other = CountingLoader::new().entry(&registry, "other");
  assert_eq!(registry.key_count(), 2);

  registry.unregister(&"group", &first);
  assert!(registry.contains_key(&"group"), "One entry is still registered");

  second.unregister();
  assert!(!registry.contains_key(&"group"));
  assert_eq!(registry.key_count(), 1);
  assert_eq!(registry.entry_count(&"other"), 1);

  // Registering again recreates the key.
  registry.register("group", &first);
  assert_eq!(registry.entry_count(&"group"), 1);
  assert!(other.get().is_ok());
}

#[test]
fn test_entry_unregister_uses_its_own_key() {
  let registry = Registry::new();
  let entry = CountingLoader::new().entry(&registry, 42u64);
  assert_eq!(entry.key(), &42);
  assert_eq!(registry.entry_count(&42), 1);

  entry.unregister();
  assert_eq!(registry.entry_count(&42), 0);
}

#[test]
fn test_remove_key_detaches_all_entries() {
  let registry = Registry::new();
  let a = CountingLoader::new().entry(&registry, "group");
  let b = CountingLoader::new().entry(&registry, "group");
  a.get().unwrap();
  b.get().unwrap();

  registry.remove_key(&"group");
  assert!(!registry.contains_key(&"group"));
  assert_eq!(registry.refresh(&"group"), 0);

  assert!(!a.needs_reload());
  assert!(!b.needs_reload());
  // Detached entries still serve their value.
  assert_eq!(*a.get().unwrap(), 0);
}

#[test]
fn test_refresh_unknown_key_is_noop() {
  let registry: Registry<String> = Registry::new();
  assert_eq!(registry.refresh(&"missing".to_string()), 0);
  assert_eq!(registry.key_count(), 0);
}

#[test]
fn test_manual_register_adds_second_key() {
  let registry = Registry::new();
  let loader = CountingLoader::new();
  let entry = loader.entry(&registry, "primary");
  entry.get().unwrap();

  registry.register("secondary", &entry);
  registry.refresh(&"secondary");

  assert_eq!(*entry.get().unwrap(), 1);
  assert_eq!(registry.key_count(), 2);
}

#[test]
fn test_dropped_entries_are_not_counted() {
  let registry = Registry::new();
  let kept = CountingLoader::new().entry(&registry, "k");
  {
    let _dropped = CountingLoader::new().entry(&registry, "k");
    assert_eq!(registry.entry_count(&"k"), 2);
  }

  assert_eq!(registry.entry_count(&"k"), 1);
  assert_eq!(registry.refresh(&"k"), 1);
  assert!(kept.needs_reload());
}

#[test]
fn test_registry_handles_share_state() {
  let registry = Registry::new();
  let handle = registry.clone();
  let entry = CountingLoader::new().entry(&registry, "k");
  entry.get().unwrap();

  handle.refresh(&"k");
  assert!(entry.needs_reload());
  assert_eq!(entry.registry().entry_count(&"k"), 1);
}

#[test]
fn test_builder_configures_registry() {
  let registry = Registry::builder().shards(16).capacity(64).build().unwrap();
  let loader = CountingLoader::new();
  let entry = loader.entry(&registry, 7u16);

  assert_eq!(*entry.get().unwrap(), 0);
  registry.refresh(&7);
  assert_eq!(*entry.get().unwrap(), 1);
}

#[test]
fn test_builder_rejects_single_shard() {
  let err = Registry::<u16>::builder().shards(1).build().unwrap_err();
  assert_eq!(err, BuildError::InvalidShardAmount(1));
  assert_eq!(
    err.to_string(),
    "shard amount must be a power of two greater than one, got 1"
  );
}
