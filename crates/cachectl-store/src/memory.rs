//! Thread-safe in-memory backend.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::kv::{KeyValueStore, TagIndex};
use crate::ttl::Ttl;

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// tag -> keys
    tags: HashMap<String, BTreeSet<String>>,
    /// key -> tags, kept in step with `tags`
    key_tags: HashMap<String, BTreeSet<String>>,
}

impl State {
    /// Drop an entry and unlink it from every tag it was registered under.
    fn remove(&mut self, key: &str) -> Option<Entry> {
        if let Some(tags) = self.key_tags.remove(key) {
            for tag in tags {
                if let Some(keys) = self.tags.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tags.remove(&tag);
                    }
                }
            }
        }
        self.entries.remove(key)
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }
}

/// In-memory [`KeyValueStore`] with key iteration and a tag index.
///
/// Expired entries are dropped lazily when they are read or listed, and
/// leave the tag index together with their entry.
#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.purge_expired(now);
        Ok(state.entries.len())
    }

    /// Check whether the store has no live entries.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let live = state
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                state.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> StoreResult<()> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        match ttl {
            Some(ttl) if ttl.is_elapsed(now) => {
                state.remove(key);
            }
            ttl => {
                let expires_at = ttl.map(|ttl| ttl.expires_at(now));
                state
                    .entries
                    .insert(key.to_string(), Entry { value, expires_at });
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        Ok(state
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    fn clear(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.entries.clear();
        state.tags.clear();
        state.key_tags.clear();
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        state.purge_expired(now);

        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn tag_index(&self) -> Option<&dyn TagIndex> {
        Some(self)
    }
}

impl TagIndex for InMemoryStore {
    fn tag_key(&self, tags: &[String], key: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        for tag in tags {
            state
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        if !tags.is_empty() {
            state
                .key_tags
                .entry(key.to_string())
                .or_default()
                .extend(tags.iter().cloned());
        }
        Ok(())
    }

    fn flush_tags(&self, tags: &[String]) -> StoreResult<u64> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        let mut doomed = BTreeSet::new();
        for tag in tags {
            if let Some(keys) = state.tags.get(tag) {
                doomed.extend(keys.iter().cloned());
            }
        }

        let mut removed = 0;
        for key in &doomed {
            if let Some(entry) = state.remove(key) {
                if !entry.is_expired(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kv::JsonStoreExt;
    use chrono::TimeZone;
    use std::time::Duration;

    fn clocked() -> (Arc<ManualClock>, InMemoryStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let store = InMemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    // === Basic Operations ===

    #[test]
    fn test_set_get_delete() {
        let store = InMemoryStore::new();
        store.set("a", b"1".to_vec(), None).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"1".to_vec()));
        assert!(store.has("a").unwrap());

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let store = InMemoryStore::new();
        store.set("a", b"1".to_vec(), None).unwrap();
        store.set("b", b"2".to_vec(), None).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_batch_defaults() {
        let store = InMemoryStore::new();
        store
            .set_many(
                vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())],
                None,
            )
            .unwrap();

        let values = store.get_many(&["a", "missing", "b"]).unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"2".to_vec())]);

        assert_eq!(store.delete_many(&["a", "b", "missing"]).unwrap(), 2);
    }

    #[test]
    fn test_json_ext() {
        let store = InMemoryStore::new();
        store.set_json("n", &42u32, None).unwrap();
        assert_eq!(store.get_json::<u32>("n").unwrap(), Some(42));
        assert_eq!(store.get_json::<u32>("missing").unwrap(), None);

        store.set("bad", b"not json".to_vec(), None).unwrap();
        assert!(matches!(
            store.get_json::<u32>("bad"),
            Err(StoreError::Serialization(_))
        ));
    }

    // === Expiry ===

    #[test]
    fn test_entry_expires() {
        let (clock, store) = clocked();
        store.set("a", b"1".to_vec(), Some(Ttl::Seconds(60))).unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(store.has("a").unwrap());

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_elapsed_ttl_removes_entry() {
        let (_clock, store) = clocked();
        store.set("a", b"1".to_vec(), None).unwrap();
        store.set("a", b"2".to_vec(), Some(Ttl::Seconds(0))).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_rewrite_extends_lifetime() {
        let (clock, store) = clocked();
        store.set("a", b"1".to_vec(), Some(Ttl::Seconds(60))).unwrap();
        clock.advance(Duration::from_secs(50));
        store.set("a", b"1".to_vec(), Some(Ttl::Seconds(60))).unwrap();
        clock.advance(Duration::from_secs(50));
        assert!(store.has("a").unwrap());
    }

    #[test]
    fn test_keys_skip_expired() {
        let (clock, store) = clocked();
        store.set("b", b"1".to_vec(), None).unwrap();
        store.set("a", b"1".to_vec(), None).unwrap();
        store.set("gone", b"1".to_vec(), Some(Ttl::Seconds(1))).unwrap();
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }

    // === Tag Index ===

    #[test]
    fn test_flush_tags_is_union() {
        let store = InMemoryStore::new();
        let index = store.tag_index().unwrap();

        store.set("p1", b"1".to_vec(), None).unwrap();
        store.set("p2", b"1".to_vec(), None).unwrap();
        store.set("u1", b"1".to_vec(), None).unwrap();
        index.tag_key(&["posts".into()], "p1").unwrap();
        index.tag_key(&["posts".into(), "users".into()], "p2").unwrap();
        index.tag_key(&["users".into()], "u1").unwrap();

        assert_eq!(index.flush_tags(&["posts".into()]).unwrap(), 2);
        assert!(!store.has("p1").unwrap());
        assert!(!store.has("p2").unwrap());
        assert!(store.has("u1").unwrap());
        assert_eq!(tag_index_size(&store), (1, 1));
    }

    fn tag_index_size(store: &InMemoryStore) -> (usize, usize) {
        let state = store.lock().unwrap();
        let forward = state.tags.values().map(BTreeSet::len).sum();
        let reverse = state.key_tags.values().map(BTreeSet::len).sum();
        (forward, reverse)
    }

    #[test]
    fn test_tag_index_shrinks_with_expiry_and_delete() {
        let (clock, store) = clocked();
        let index = store.tag_index().unwrap();
        let tags = vec!["request".to_string(), "posts".to_string()];

        for i in 0..100 {
            let key = format!("request/{i}");
            index.tag_key(&tags, &key).unwrap();
            store.set(&key, b"1".to_vec(), Some(Ttl::Seconds(1))).unwrap();
        }
        index.tag_key(&tags, "kept").unwrap();
        store.set("kept", b"1".to_vec(), None).unwrap();
        assert_eq!(tag_index_size(&store), (202, 202));

        clock.advance(Duration::from_secs(5));
        for i in 0..50 {
            assert_eq!(store.get(&format!("request/{i}")).unwrap(), None);
        }
        assert_eq!(tag_index_size(&store), (102, 102));

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(tag_index_size(&store), (2, 2));

        assert!(store.delete("kept").unwrap());
        assert_eq!(tag_index_size(&store), (0, 0));
        assert!(store.lock().unwrap().tags.is_empty());
    }

    #[test]
    fn test_elapsed_overwrite_unlinks_tags() {
        let (_clock, store) = clocked();
        let index = store.tag_index().unwrap();
        index.tag_key(&["posts".into()], "p1").unwrap();
        store.set("p1", b"1".to_vec(), None).unwrap();

        store.set("p1", b"1".to_vec(), Some(Ttl::Seconds(0))).unwrap();
        assert_eq!(tag_index_size(&store), (0, 0));
    }

    #[test]
    fn test_flush_unlinks_other_tags() {
        let store = InMemoryStore::new();
        let index = store.tag_index().unwrap();
        store.set("p2", b"1".to_vec(), None).unwrap();
        index.tag_key(&["posts".into(), "users".into()], "p2").unwrap();

        assert_eq!(index.flush_tags(&["posts".into()]).unwrap(), 1);
        assert_eq!(tag_index_size(&store), (0, 0));
        assert_eq!(index.flush_tags(&["users".into()]).unwrap(), 0);
    }
}
