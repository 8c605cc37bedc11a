//! DNS response cache.
//!
//! Allowed answers expire after the TTL of their first record; blocked
//! outcomes never expire. Expired entries are removed lazily by the read
//! that finds them, there is no background sweep.

use hickory_proto::rr::Record;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::dns::QueryKey;

struct CacheEntry {
    answers: Arc<[Record]>,
    /// `None` for blocked entries.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn hit(&self) -> CacheHit {
        match self.expires_at {
            Some(_) => CacheHit::Allowed(self.answers.clone()),
            None => CacheHit::Blocked(self.answers.clone()),
        }
    }
}

/// Outcome of a cache hit.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheHit {
    Allowed(Arc<[Record]>),
    Blocked(Arc<[Record]>),
}

/// Shared query-outcome cache.
///
/// The lock only guards map access. No I/O happens while it is held.
#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<FxHashMap<QueryKey, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<CacheHit> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`.
    ///
    /// An expired allowed entry is re-checked under the write lock before it
    /// is removed, so a concurrent refresh is returned instead of deleted.
    pub fn get_at(&self, key: &QueryKey, now: Instant) -> Option<CacheHit> {
        {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.hit());
            }
        }

        let mut entries = self.entries.write().ok()?;
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            entries.remove(key);
            trace!(name = %key.name, qtype = %key.qtype, "evicted expired cache entry");
            return None;
        }

        Some(entry.hit())
    }

    /// Cache an allowed outcome for `ttl_secs`. A zero TTL is not cached.
    pub fn set(&self, key: QueryKey, answers: &[Record], ttl_secs: u32) {
        self.set_at(key, answers, ttl_secs, Instant::now());
    }

    pub fn set_at(&self, key: QueryKey, answers: &[Record], ttl_secs: u32, now: Instant) {
        if ttl_secs == 0 {
            return;
        }
        let entry = CacheEntry {
            answers: answers.into(),
            expires_at: Some(now + Duration::from_secs(u64::from(ttl_secs))),
        };
        self.insert(key, entry);
    }

    /// Cache a blocked outcome. It never expires.
    pub fn set_blocked(&self, key: QueryKey, answers: &[Record]) {
        let entry = CacheEntry {
            answers: answers.into(),
            expires_at: None,
        };
        self.insert(key, entry);
    }

    fn insert(&self, key: QueryKey, entry: CacheEntry) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use hickory_proto::rr::{DNSClass, RecordType};
    use std::net::Ipv4Addr;
    use std::thread;

    use super::*;
    use crate::dns::testing::a_record;

    fn key(name: &str) -> QueryKey {
        QueryKey {
            name: name.to_string(),
            qtype: RecordType::A,
            qclass: DNSClass::IN,
        }
    }

    fn answers(name: &str, ttl: u32) -> Vec<Record> {
        vec![a_record(name, ttl, Ipv4Addr::new(192, 0, 2, 1))]
    }

    #[test]
    fn miss_on_empty_cache() {
        let cache = ResponseCache::new();

        assert_eq!(cache.get(&key("a.com.")), None);
    }

    #[test]
    fn allowed_entry_round_trip_and_expiry() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        let records = answers("a.com.", 60);
        cache.set_at(key("a.com."), &records, 60, now);

        assert_eq!(
            cache.get_at(&key("a.com."), now),
            Some(CacheHit::Allowed(records.clone().into()))
        );
        assert_eq!(
            cache.get_at(&key("a.com."), now + Duration::from_secs(59)),
            Some(CacheHit::Allowed(records.into()))
        );

        assert_eq!(cache.get_at(&key("a.com."), now + Duration::from_secs(60)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn blocked_entry_never_expires() {
        let cache = ResponseCache::new();
        cache.set_blocked(key("ads.com."), &[]);
        let much_later = Instant::now() + Duration::from_secs(10 * 365 * 24 * 3600);

        assert_eq!(
            cache.get_at(&key("ads.com."), much_later),
            Some(CacheHit::Blocked(Vec::new().into()))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_ttl_is_not_cached() {
        let cache = ResponseCache::new();
        cache.set(key("a.com."), &answers("a.com.", 0), 0);

        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a.com.")), None);
    }

    #[test]
    fn reads_do_not_mutate_live_entries() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache.set_at(key("a.com."), &answers("a.com.", 30), 30, now);
        cache.set_blocked(key("b.com."), &[]);

        for _ in 0..10 {
            cache.get_at(&key("a.com."), now);
            cache.get_at(&key("b.com."), now);
            cache.get_at(&key("missing.com."), now);
        }

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entry_is_evicted_once() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache.set_at(key("a.com."), &answers("a.com.", 1), 1, now);
        cache.set_at(key("b.com."), &answers("b.com.", 300), 300, now);
        let later = now + Duration::from_secs(2);

        assert_eq!(cache.get_at(&key("a.com."), later), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&key("a.com."), later), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn refresh_replaces_entry_wholesale() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache.set_at(key("a.com."), &answers("a.com.", 10), 10, now);
        cache.set_blocked(key("a.com."), &[]);

        assert_eq!(
            cache.get_at(&key("a.com."), now + Duration::from_secs(20)),
            Some(CacheHit::Blocked(Vec::new().into()))
        );
    }

    #[test]
    fn concurrent_disjoint_keys_lose_no_updates() {
        let cache = Arc::new(ResponseCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        let name = format!("t{t}-{i}.com.");
                        if i % 2 == 0 {
                            cache.set(key(&name), &answers(&name, 300), 300);
                        } else {
                            cache.set_blocked(key(&name), &[]);
                        }
                        assert!(cache.get(&key(&name)).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 800);
        assert!(matches!(cache.get(&key("t3-10.com.")), Some(CacheHit::Allowed(_))));
        assert!(matches!(cache.get(&key("t3-11.com.")), Some(CacheHit::Blocked(_))));
    }

    #[test]
    fn same_key_settles_on_a_written_value() {
        let cache = Arc::new(ResponseCache::new());
        let written = answers("shared.com.", 300);
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                let written = written.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        cache.set(key("shared.com."), &written, 300);
                        cache.get(&key("shared.com."));
                        if t % 2 == 0 {
                            cache.set_blocked(key("shared.com."), &[]);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 1);
        match cache.get(&key("shared.com.")) {
            Some(CacheHit::Allowed(got)) => assert_eq!(&*got, written.as_slice()),
            Some(CacheHit::Blocked(got)) => assert!(got.is_empty()),
            None => panic!("shared entry lost"),
        }
    }

    #[test]
    fn expired_read_never_deletes_a_refresh() {
        let cache = Arc::new(ResponseCache::new());
        let now = Instant::now();
        let later = now + Duration::from_secs(20);
        let stale = answers("hot.com.", 10);
        let fresh = answers("hot.com.", 60);
        cache.set_at(key("hot.com."), &stale, 10, now);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        match cache.get_at(&key("hot.com."), later) {
                            Some(CacheHit::Allowed(got)) => assert_eq!(got[0].ttl(), 60),
                            Some(CacheHit::Blocked(_)) => panic!("never blocked"),
                            None => {}
                        }
                    }
                })
            })
            .collect();
        let writer = {
            let cache = cache.clone();
            thread::spawn(move || {
                for _ in 0..2_000 {
                    // Expired as of `later`, then refreshed past it.
                    cache.set_at(key("hot.com."), &stale, 10, now);
                    cache.set_at(key("hot.com."), &fresh, 60, now);
                }
            })
        };
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get_at(&key("hot.com."), later), Some(CacheHit::Allowed(_))));
    }
}
