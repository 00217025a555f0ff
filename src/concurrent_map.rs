//!
//! Sharded concurrent map.
//!
//! A fixed shard count, each guarded by its own reader-writer lock; a 64-bit
//! hash of the key selects the shard. Shards never resize at runtime.
//!

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

const MIN_SHARDS: usize = 16;

pub struct ShardedMap<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
    mask: u64,
}

impl<V: Clone> ShardedMap<V> {
    /// `size_hint` informs the shard count: the smallest power of two
    /// greater than or equal to both `MIN_SHARDS` and `size_hint / 64`.
    pub fn new(size_hint: usize) -> Self {
        let mut count = MIN_SHARDS;
        while count < size_hint / 64 {
            count *= 2;
        }
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();
        ShardedMap { shards, mask: (count - 1) as u64 }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() & self.mask) as usize
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let idx = self.shard_index(key);
        self.shards[idx].read().unwrap().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let idx = self.shard_index(key);
        self.shards[idx].read().unwrap().contains_key(key)
    }

    /// Always succeeds; returns `true` if this was a fresh insert.
    pub fn put(&self, key: String, value: V) -> bool {
        let idx = self.shard_index(&key);
        self.shards[idx].write().unwrap().insert(key, value).is_none()
    }

    pub fn put_if_absent(&self, key: String, value: V) -> bool {
        let idx = self.shard_index(&key);
        let mut shard = self.shards[idx].write().unwrap();
        if shard.contains_key(&key) {
            false
        } else {
            shard.insert(key, value);
            true
        }
    }

    pub fn put_if_present(&self, key: &str, value: V) -> bool {
        let idx = self.shard_index(key);
        let mut shard = self.shards[idx].write().unwrap();
        if let Some(slot) = shard.get_mut(key) {
            *slot = value;
            true
        } else {
            false
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        let idx = self.shard_index(key);
        self.shards[idx].write().unwrap().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        for shard in &self.shards {
            out.extend(shard.read().unwrap().keys().cloned());
        }
        out
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().unwrap().clear();
        }
    }

    /// Visit every entry while holding each shard's read lock in turn. No
    /// global lock is taken — this is a snapshot-per-shard, not a
    /// whole-map-consistent view.
    pub fn range_locked(&self, mut visit: impl FnMut(&str, &V)) {
        for shard in &self.shards {
            let guard = shard.read().unwrap();
            for (k, v) in guard.iter() {
                visit(k, v);
            }
        }
    }

    /// Apply `f` to the value at `key` under the owning shard's write lock,
    /// returning `f`'s result, or `None` if the key is absent.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let idx = self.shard_index(key);
        let mut shard = self.shards[idx].write().unwrap();
        shard.get_mut(key).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove_roundtrip() {
        let m: ShardedMap<i64> = ShardedMap::new(16);
        assert!(m.put("a".into(), 1));
        assert!(!m.put("a".into(), 2));
        assert_eq!(m.get("a"), Some(2));
        assert!(m.remove("a"));
        assert_eq!(m.get("a"), None);
    }

    #[test]
    fn put_if_absent_and_present() {
        let m: ShardedMap<i64> = ShardedMap::new(16);
        assert!(m.put_if_absent("k".into(), 1));
        assert!(!m.put_if_absent("k".into(), 2));
        assert_eq!(m.get("k"), Some(1));
        assert!(m.put_if_present("k", 9));
        assert!(!m.put_if_present("missing", 9));
        assert_eq!(m.get("k"), Some(9));
    }

    #[test]
    fn shard_count_is_power_of_two_and_at_least_min() {
        let m: ShardedMap<i64> = ShardedMap::new(0);
        assert_eq!(m.shards.len(), MIN_SHARDS);
        let m2: ShardedMap<i64> = ShardedMap::new(4096);
        assert!(m2.shards.len() >= MIN_SHARDS);
        assert!(m2.shards.len().is_power_of_two());
    }

    #[test]
    fn concurrent_inserts_are_observed() {
        use std::sync::Arc;
        use std::thread;

        let m: Arc<ShardedMap<i64>> = Arc::new(ShardedMap::new(16));
        let mut handles = Vec::new();
        for i in 0..8 {
            let m = m.clone();
            handles.push(thread::spawn(move || {
                m.put(format!("key{i}"), i);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.len(), 8);
    }
}
