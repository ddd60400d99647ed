use fibre_refresh::{CachedEntry, Registry};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Settings {
  revision: u64,
  endpoint: String,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fibre_refresh=debug")),
    )
    .with_thread_ids(true)
    .init();

  let registry = Registry::new();
  let revision = Arc::new(AtomicU64::new(0));

  // The "source of truth" that the cached values are derived from.
  let settings = CachedEntry::new(&registry, "settings", {
    let revision = revision.clone();
    move || {
      let revision = revision.fetch_add(1, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(100));
      Settings {
        revision,
        endpoint: format!("https://api.example.com/v{}", revision + 1),
      }
    }
  });

  // A value derived from the settings, refreshed under the same key.
  let banner = CachedEntry::new(&registry, "settings", {
    let settings = settings.clone();
    move || match settings.get() {
      Ok(settings) => format!("rev {} -> {}", settings.revision, settings.endpoint),
      Err(e) => format!("settings unavailable: {e}"),
    }
  });

  let running = Arc::new(AtomicBool::new(true));

  // The periodic refresh driver.
  let refresher = {
    let registry = registry.clone();
    let running = running.clone();
    thread::spawn(move || {
      while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(500));
        let marked = registry.refresh(&"settings");
        println!("[refresher] marked {marked} entries for reload");
      }
    })
  };

  let readers: Vec<_> = (0..3)
    .map(|id| {
      let banner = banner.clone();
      thread::spawn(move || {
        for _ in 0..10 {
          match banner.get() {
            Ok(value) => println!("[reader {id}] {value}"),
            Err(e) => println!("[reader {id}] load failed: {e}"),
          }
          thread::sleep(Duration::from_millis(200));
        }
      })
    })
    .collect();

  for reader in readers {
    reader.join().expect("reader thread panicked");
  }
  running.store(false, Ordering::Relaxed);
  refresher.join().expect("refresher thread panicked");

  println!("\nFinal state: {:#?}", settings);
}
