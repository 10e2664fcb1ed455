//! In-memory key/value cache with per-entry time-to-live.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::{Clock, SystemClock};

/// TTL applied by [`TtlCache::set`] when the caller passes none.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

/// A single cached value with its insertion time and lifetime.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
  value: V,
  stored_at: DateTime<Utc>,
  ttl: Duration,
}

impl<V> CacheEntry<V> {
  fn is_valid(&self, now: DateTime<Utc>) -> bool {
    now - self.stored_at <= self.ttl
  }
}

/// Short-lived cache for fetched data.
///
/// Entries expire lazily: an expired entry stays in the map until the next
/// `get` for its key (or an explicit [`purge_expired`](Self::purge_expired)),
/// at which point it is removed and reported as a miss. There is no bound on
/// the number of entries.
pub struct TtlCache<V> {
  entries: HashMap<String, CacheEntry<V>>,
  clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
  /// Create an empty cache driven by the system clock.
  pub fn new() -> Self {
    Self::with_clock(Arc::new(SystemClock))
  }

  /// Create an empty cache driven by the given clock.
  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: HashMap::new(),
      clock,
    }
  }

  /// Insert or overwrite `key`, stamping it with the current time.
  pub fn set(&mut self, key: &str, value: V, ttl: Option<Duration>) {
    let entry = CacheEntry {
      value,
      stored_at: self.clock.now(),
      ttl: ttl.unwrap_or_else(|| Duration::minutes(DEFAULT_TTL_MINUTES)),
    };
    self.entries.insert(key.to_string(), entry);
  }

  /// Look up `key`, dropping it if it has outlived its TTL.
  pub fn get(&mut self, key: &str) -> Option<V> {
    let now = self.clock.now();
    let entry = self.entries.get(key)?;

    if !entry.is_valid(now) {
      self.entries.remove(key);
      return None;
    }

    Some(entry.value.clone())
  }

  /// Remove every entry.
  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Remove all expired entries, returning how many were dropped.
  pub fn purge_expired(&mut self) -> usize {
    let now = self.clock.now();
    let before = self.entries.len();
    self.entries.retain(|_, entry| entry.is_valid(now));
    before - self.entries.len()
  }

  /// Raw presence check. Does not expire anything.
  pub fn contains_key(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  /// Number of stored entries, expired or not.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<V: Clone> Default for TtlCache<V> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use serde_json::json;

  fn cache_at_epoch() -> (TtlCache<serde_json::Value>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
    let cache = TtlCache::with_clock(clock.clone());
    (cache, clock)
  }

  #[test]
  fn test_get_within_ttl_returns_value() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("profile", json!({"name": "A"}), Some(Duration::milliseconds(1000)));

    clock.advance(Duration::milliseconds(999));
    assert_eq!(cache.get("profile"), Some(json!({"name": "A"})));
  }

  #[test]
  fn test_get_missing_key_is_none() {
    let (mut cache, _clock) = cache_at_epoch();
    assert_eq!(cache.get("nothing"), None);
  }

  #[test]
  fn test_expired_entry_is_purged_on_read() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("projects", json!([1, 2, 3]), Some(Duration::milliseconds(100)));

    clock.advance(Duration::milliseconds(101));
    assert!(cache.contains_key("projects"));
    assert_eq!(cache.get("projects"), None);
    assert!(!cache.contains_key("projects"));
    assert_eq!(cache.len(), 0);
  }

  #[test]
  fn test_entry_is_valid_exactly_at_ttl() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("k", json!(1), Some(Duration::milliseconds(50)));

    clock.advance(Duration::milliseconds(50));
    assert_eq!(cache.get("k"), Some(json!(1)));
  }

  #[test]
  fn test_profile_scenario() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("profile", json!({"name": "A"}), Some(Duration::milliseconds(1000)));

    clock.advance(Duration::milliseconds(500));
    assert_eq!(cache.get("profile"), Some(json!({"name": "A"})));

    clock.advance(Duration::milliseconds(600));
    assert_eq!(cache.get("profile"), None);
  }

  #[test]
  fn test_default_ttl_is_five_minutes() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("portfolio_data", json!("x"), None);

    clock.advance(Duration::minutes(5));
    assert!(cache.get("portfolio_data").is_some());

    clock.advance(Duration::milliseconds(1));
    assert!(cache.get("portfolio_data").is_none());
  }

  #[test]
  fn test_overwrite_restamps_entry() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("k", json!("old"), Some(Duration::seconds(10)));

    clock.advance(Duration::seconds(8));
    cache.set("k", json!("new"), Some(Duration::seconds(10)));

    clock.advance(Duration::seconds(8));
    assert_eq!(cache.get("k"), Some(json!("new")));
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_clear_removes_everything() {
    let (mut cache, _clock) = cache_at_epoch();
    cache.set("a", json!(1), None);
    cache.set("b", json!(2), None);

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), None);
  }

  #[test]
  fn test_purge_expired_keeps_live_entries() {
    let (mut cache, clock) = cache_at_epoch();
    cache.set("short", json!(1), Some(Duration::seconds(1)));
    cache.set("long", json!(2), Some(Duration::seconds(60)));

    clock.advance(Duration::seconds(2));

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("long"), Some(json!(2)));
  }
}
