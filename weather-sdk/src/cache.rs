//! In-memory LRU cache of weather records with a fixed capacity and TTL.
//!
//! Expiry is checked lazily when an entry is read; there is no sweeper.
//! The cache itself is not synchronized. [`Session`](crate::Session) wraps it
//! in a reader/writer lock; hits only need the shared side because recency is
//! tracked with atomic stamps.

use chrono::{DateTime, TimeDelta, Utc};
use std::{
    collections::HashMap,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    WeatherError, WeatherRecord,
    clock::{Clock, SystemClock},
};

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_TTL_SECS: i64 = 10 * 60;

pub fn default_ttl() -> TimeDelta {
    TimeDelta::seconds(DEFAULT_TTL_SECS)
}

/// A stored record and the moment it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    record: WeatherRecord,
    stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(record: WeatherRecord, stored_at: DateTime<Utc>) -> Self {
        Self { record, stored_at }
    }

    pub fn record(&self) -> &WeatherRecord {
        &self.record
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    /// Fresh while `now <= stored_at + ttl`.
    ///
    /// Compared as an age so a TTL reaching past the last representable
    /// date cannot overflow.
    pub fn is_fresh(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.stored_at) <= ttl
    }
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    last_used: AtomicU64,
}

/// Result of a shared-access lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(WeatherRecord),
    /// Present but stale; the caller should drop it via [`WeatherCache::remove_expired`].
    Expired,
    Miss,
}

#[derive(Debug)]
pub struct WeatherCache {
    slots: HashMap<String, Slot>,
    capacity: NonZeroUsize,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    ticks: AtomicU64,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self {
            slots: HashMap::with_capacity(DEFAULT_CAPACITY + 1),
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ttl: default_ttl(),
            clock: Arc::new(SystemClock),
            ticks: AtomicU64::new(0),
        }
    }
}

impl WeatherCache {
    /// Cache with 10 slots, a 10 minute TTL and the wall clock.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(
        capacity: usize,
        ttl: TimeDelta,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WeatherError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| WeatherError::validation("Cache capacity must be greater than zero"))?;
        if ttl <= TimeDelta::zero() {
            return Err(WeatherError::validation("Cache TTL must be greater than zero"));
        }

        Ok(Self {
            slots: HashMap::with_capacity(capacity.get() + 1),
            capacity,
            ttl,
            clock,
            ticks: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn next_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look `key` up without structural changes. A hit marks the key as most recently used.
    pub fn lookup(&self, key: &str) -> Lookup {
        let Some(slot) = self.slots.get(key) else {
            return Lookup::Miss;
        };

        if !slot.entry.is_fresh(self.ttl, self.clock.now()) {
            return Lookup::Expired;
        }

        slot.last_used.store(self.next_tick(), Ordering::Relaxed);
        Lookup::Hit(slot.entry.record.clone())
    }

    /// Return the fresh record for `key`, dropping it first if it has expired.
    pub fn get(&mut self, key: &str) -> Option<WeatherRecord> {
        match self.lookup(key) {
            Lookup::Hit(record) => Some(record),
            Lookup::Expired => {
                self.slots.remove(key);
                None
            }
            Lookup::Miss => None,
        }
    }

    /// Remove `key` if it is still expired. Returns whether something was removed.
    pub fn remove_expired(&mut self, key: &str) -> bool {
        let now = self.clock.now();
        let expired = self
            .slots
            .get(key)
            .is_some_and(|slot| !slot.entry.is_fresh(self.ttl, now));

        if expired {
            self.slots.remove(key);
        }
        expired
    }

    /// Insert or replace `key`, stamping it with the current time.
    ///
    /// Returns the key evicted to stay within capacity, if any.
    pub fn put(&mut self, key: impl Into<String>, record: WeatherRecord) -> Option<String> {
        let key = key.into();
        let entry = CacheEntry::new(record, self.clock.now());
        let tick = self.next_tick();

        if let Some(slot) = self.slots.get_mut(&key) {
            slot.entry = entry;
            *slot.last_used.get_mut() = tick;
            return None;
        }

        self.slots.insert(
            key,
            Slot {
                entry,
                last_used: AtomicU64::new(tick),
            },
        );

        if self.slots.len() > self.capacity.get() {
            self.evict_least_recent()
        } else {
            None
        }
    }

    fn evict_least_recent(&mut self) -> Option<String> {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone())?;

        self.slots.remove(&victim);
        Some(victim)
    }

    pub fn remove(&mut self, key: &str) {
        self.slots.remove(key);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of every stored key, in no particular order.
    pub fn list_keys(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Inspect an entry without touching recency or expiry.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.slots.get(key).map(|slot| &slot.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn record(name: &str) -> WeatherRecord {
        WeatherRecord {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn cache_with_clock(capacity: usize) -> (WeatherCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = WeatherCache::with_settings(capacity, default_ttl(), clock.clone())
            .expect("valid settings");
        (cache, clock)
    }

    #[test]
    fn rejects_zero_capacity_and_ttl() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        assert!(WeatherCache::with_settings(0, default_ttl(), clock.clone()).is_err());
        assert!(WeatherCache::with_settings(10, TimeDelta::zero(), clock).is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let cache = WeatherCache::new();
        assert_eq!(cache.capacity(), 10);
        assert_eq!(cache.ttl(), TimeDelta::minutes(10));
        assert!(cache.is_empty());
    }

    #[test]
    fn keeps_most_recent_inserts_when_over_capacity() {
        let mut cache = WeatherCache::new();

        for i in 1..=11 {
            cache.put(format!("City{i}"), record(&format!("City{i}")));
        }

        assert_eq!(cache.size(), 10);
        assert_eq!(cache.get("City1"), None);
        assert_eq!(cache.get("City11"), Some(record("City11")));
    }

    #[test]
    fn many_inserts_retain_exactly_capacity_newest() {
        let mut cache = WeatherCache::with_settings(3, default_ttl(), Arc::new(SystemClock)).unwrap();

        for i in 0..20 {
            cache.put(format!("k{i}"), record("x"));
            assert!(cache.size() <= 3);
        }

        let mut keys = cache.list_keys();
        keys.sort();
        assert_eq!(keys, vec!["k17", "k18", "k19"]);
    }

    #[test]
    fn get_refreshes_recency() {
        let (mut cache, _clock) = cache_with_clock(3);
        cache.put("A", record("A"));
        cache.put("B", record("B"));
        cache.put("C", record("C"));

        assert!(cache.get("A").is_some());
        let evicted = cache.put("D", record("D"));

        assert_eq!(evicted.as_deref(), Some("B"));
        assert!(cache.peek("A").is_some());
        assert!(cache.peek("B").is_none());
    }

    #[test]
    fn put_on_existing_key_refreshes_recency_without_eviction() {
        let (mut cache, _clock) = cache_with_clock(2);
        cache.put("A", record("A"));
        cache.put("B", record("B"));

        assert_eq!(cache.put("A", record("A2")), None);
        assert_eq!(cache.size(), 2);

        let evicted = cache.put("C", record("C"));
        assert_eq!(evicted.as_deref(), Some("B"));
        assert_eq!(cache.get("A"), Some(record("A2")));
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let (mut cache, clock) = cache_with_clock(10);
        cache.put("Moscow", record("Moscow"));

        clock.advance(TimeDelta::minutes(11));

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get("Moscow"), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn entry_at_exact_ttl_boundary_is_fresh() {
        let (mut cache, clock) = cache_with_clock(10);
        cache.put("Oslo", record("Oslo"));

        clock.advance(default_ttl());
        assert!(cache.get("Oslo").is_some());

        clock.advance(TimeDelta::seconds(1));
        assert!(cache.get("Oslo").is_none());
    }

    #[test]
    fn ttl_beyond_calendar_range_never_expires() {
        let clock = Arc::new(ManualClock::default());
        let ttl = TimeDelta::try_seconds(9_000_000_000_000).unwrap();
        let mut cache = WeatherCache::with_settings(10, ttl, clock.clone()).unwrap();
        cache.put("Paris", record("Paris"));

        assert!(cache.get("Paris").is_some());

        clock.advance(TimeDelta::days(365 * 1000));
        assert!(cache.get("Paris").is_some());
    }

    #[test]
    fn lookup_reports_expired_without_removing() {
        let (mut cache, clock) = cache_with_clock(10);
        cache.put("Rome", record("Rome"));
        clock.advance(TimeDelta::minutes(30));

        assert_eq!(cache.lookup("Rome"), Lookup::Expired);
        assert_eq!(cache.size(), 1);

        assert!(cache.remove_expired("Rome"));
        assert!(!cache.remove_expired("Rome"));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn remove_expired_keeps_entries_refreshed_meanwhile() {
        let (mut cache, clock) = cache_with_clock(10);
        cache.put("Rome", record("old"));
        clock.advance(TimeDelta::minutes(30));
        cache.put("Rome", record("new"));

        assert!(!cache.remove_expired("Rome"));
        assert_eq!(cache.get("Rome"), Some(record("new")));
    }

    #[test]
    fn put_restamps_stored_at() {
        let (mut cache, clock) = cache_with_clock(10);
        cache.put("Paris", record("Paris"));
        let first = cache.peek("Paris").unwrap().stored_at();

        clock.advance(TimeDelta::minutes(5));
        cache.put("Paris", record("Paris"));

        assert_eq!(
            cache.peek("Paris").unwrap().stored_at(),
            first + TimeDelta::minutes(5)
        );
    }

    #[test]
    fn remove_and_clear_are_idempotent() {
        let mut cache = WeatherCache::new();
        cache.put("A", record("A"));
        cache.put("B", record("B"));

        cache.remove("A");
        cache.remove("A");
        cache.remove("missing");
        assert_eq!(cache.size(), 1);

        cache.clear();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.list_keys().is_empty());
    }
}
