use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Time source for cache expiry. Swapped for a manual clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Entry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

/// String-keyed cache where entries expire `ttl` after insertion.
/// Expired entries are evicted on lookup.
pub struct TtlCache<V, C: Clock = SystemClock> {
    ttl: Duration,
    clock: C,
    entries: HashMap<String, Entry<V>>,
}

impl<V: Clone, C: Clock> TtlCache<V, C> {
    pub fn new(ttl: Duration, clock: C) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if now - entry.fetched_at < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let fetched_at = self.clock.now();
        self.entries.insert(key.into(), Entry { value, fetched_at });
    }

    /// Drop every expired entry.
    pub fn purge(&mut self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries.retain(|_, e| now - e.fetched_at < ttl);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Manually advanced clock shared between a test and a cache.
    #[derive(Clone)]
    pub(crate) struct ManualClock(pub Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        pub(crate) fn new() -> Self {
            let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            Self(Arc::new(Mutex::new(start)))
        }

        pub(crate) fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn test_hit_before_ttl() {
        let clock = ManualClock::new();
        let mut cache = TtlCache::new(Duration::seconds(60), clock.clone());
        cache.insert("AAPL", 1.0);
        clock.advance(59);
        assert_eq!(cache.get("AAPL"), Some(1.0));
    }

    #[test]
    fn test_expired_entry_evicted() {
        let clock = ManualClock::new();
        let mut cache = TtlCache::new(Duration::seconds(60), clock.clone());
        cache.insert("AAPL", 1.0);
        clock.advance(60);
        assert_eq!(cache.get("AAPL"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_refreshes() {
        let clock = ManualClock::new();
        let mut cache = TtlCache::new(Duration::seconds(10), clock.clone());
        cache.insert("X", 1);
        clock.advance(8);
        cache.insert("X", 2);
        clock.advance(8);
        assert_eq!(cache.get("X"), Some(2));
    }

    #[test]
    fn test_purge() {
        let clock = ManualClock::new();
        let mut cache = TtlCache::new(Duration::seconds(10), clock.clone());
        cache.insert("old", 1);
        clock.advance(5);
        cache.insert("new", 2);
        clock.advance(6);
        cache.purge();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("new"), Some(2));
    }
}
