//! TTL cache with single-flight loading.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::traits::CacheKey;

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A published value with its expiry data
struct Entry<V> {
  value: V,
  inserted_at: Instant,
  ttl: Duration,
}

impl<V> Entry<V> {
  fn is_live(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.inserted_at) < self.ttl
  }
}

enum Slot<V, E> {
  Ready(Entry<V>),
  /// A load in progress; every caller for the key awaits this same future
  Loading(SharedLoad<V, E>),
}

enum Lookup<V, E> {
  Hit(V),
  InFlight(SharedLoad<V, E>),
  Miss,
}

type Table<V, E> = Arc<Mutex<HashMap<String, Slot<V, E>>>>;

/// Key → value cache with per-entry expiry and one load per key at a time.
///
/// Callers get clones of cached values, never a handle into the table.
/// Each load runs on its own task and publishes its own result: a waiter
/// that gives up (deadline, drop) does not stop it, and the entry is either
/// fully published or not published at all. Must be used inside a Tokio
/// runtime.
pub struct TtlCache<V, E> {
  table: Table<V, E>,
}

impl<V, E> TtlCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      table: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Return the live value for `key`, or run `loader` to produce it.
  ///
  /// Concurrent callers for the same key share a single `loader` run and
  /// all receive its result. Failures are handed to every waiter and leave
  /// nothing behind, so the next call loads fresh.
  pub async fn get_or_load<K, F, Fut>(&self, key: &K, ttl: Duration, loader: F) -> Result<V, E>
  where
    K: CacheKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let hash = key.cache_hash();

    let load = {
      let mut table = lock(&self.table);

      let lookup = match table.get(&hash) {
        Some(Slot::Ready(entry)) if entry.is_live(Instant::now()) => {
          Lookup::Hit(entry.value.clone())
        }
        Some(Slot::Loading(load)) => Lookup::InFlight(load.clone()),
        _ => Lookup::Miss,
      };

      match lookup {
        Lookup::Hit(value) => {
          trace!(key = %key.description(), "cache hit");
          return Ok(value);
        }
        Lookup::InFlight(load) => {
          debug!(key = %key.description(), "joining in-flight load");
          load
        }
        Lookup::Miss => {
          // Expired entries are dropped here, on access
          debug!(key = %key.description(), "cache miss, loading");
          let load = publishing_load(Arc::clone(&self.table), hash.clone(), ttl, loader());
          table.insert(hash, Slot::Loading(load.clone()));
          // Driven to completion even if every waiter gives up; it cannot
          // publish before the slot above exists, the lock is still held
          tokio::spawn(load.clone());
          load
        }
      }
    };

    load.await
  }

  /// Number of slots, loading or ready (expired ones included until touched)
  pub fn len(&self) -> usize {
    lock(&self.table).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<V, E> Default for TtlCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

/// Wrap a loader so that completing it updates the table.
fn publishing_load<V, E, Fut>(
  table: Table<V, E>,
  hash: String,
  ttl: Duration,
  load: Fut,
) -> SharedLoad<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
  Fut: Future<Output = Result<V, E>> + Send + 'static,
{
  async move {
    let result = load.await;
    let mut table = lock(&table);
    match &result {
      Ok(value) => {
        table.insert(
          hash,
          Slot::Ready(Entry {
            value: value.clone(),
            inserted_at: Instant::now(),
            ttl,
          }),
        );
      }
      Err(_) => {
        table.remove(&hash);
      }
    }
    result
  }
  .boxed()
  .shared()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  // The table is consistent between statements; a panicking holder cannot
  // leave it half-updated
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
