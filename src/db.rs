//!
//! Database: one keyspace + one TTL map + per-key lock table.
//!

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::connection::ConnectionState;
use crate::concurrent_map::ShardedMap;
use crate::error::RudisError;
use crate::obj::RedisValue;
use crate::registry::CommandRegistry;
use crate::resp::Response;

/// Sentinel meaning "never expires".
pub const UNLIMITED: i64 = -1;
/// Sentinel `TTL` return for "absent or already expired".
pub const ABSENT: i64 = -2;

pub fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

pub struct Database {
    pub id: i32,
    keyspace: ShardedMap<RedisValue>,
    ttls: ShardedMap<i64>,
    locks: KeyLockTable,
}

impl Database {
    pub fn new(id: i32) -> Self {
        Database {
            id,
            keyspace: ShardedMap::new(256),
            ttls: ShardedMap::new(256),
            locks: KeyLockTable::new(),
        }
    }

    /// Lazily purge `key` if its TTL has passed. Returns `true` if the key
    /// was removed.
    fn purge_if_expired(&self, key: &str) -> bool {
        match self.ttls.get(key) {
            Some(expiry) if expiry <= now_ms() => {
                self.keyspace.remove(key);
                self.ttls.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<RedisValue> {
        self.purge_if_expired(key);
        self.keyspace.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.purge_if_expired(key);
        self.keyspace.contains_key(key)
    }

    pub fn put(&self, key: String, value: RedisValue) -> bool {
        let inserted = self.keyspace.put(key.clone(), value);
        if inserted {
            // A fresh key starts with no TTL; clear any stale leftover.
            self.ttls.remove(&key);
        }
        inserted
    }

    pub fn put_if_absent(&self, key: String, value: RedisValue) -> bool {
        self.purge_if_expired(&key);
        self.keyspace.put_if_absent(key, value)
    }

    pub fn put_if_present(&self, key: &str, value: RedisValue) -> bool {
        self.purge_if_expired(key);
        self.keyspace.put_if_present(key, value)
    }

    pub fn remove(&self, key: &str) -> bool {
        let present = self.keyspace.remove(key);
        self.ttls.remove(key);
        present
    }

    pub fn len(&self) -> usize {
        self.keyspace.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keyspace.keys()
    }

    pub fn clear(&self) {
        self.keyspace.clear();
        self.ttls.clear();
    }

    /// Atomically mutate the value at `key` under the owning shard's write
    /// lock, without needing a separate per-key lock.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut RedisValue) -> R) -> Option<R> {
        self.purge_if_expired(key);
        self.keyspace.update(key, f)
    }

    /// `expiry_ms` is an absolute Unix millisecond timestamp, or
    /// [`UNLIMITED`] to clear any TTL.
    pub fn set_ttl(&self, key: &str, expiry_ms: i64) {
        if expiry_ms == UNLIMITED {
            self.ttls.remove(key);
        } else {
            self.ttls.put(key.to_string(), expiry_ms);
        }
    }

    /// Remaining milliseconds, [`UNLIMITED`] if no expiry is set, or
    /// [`ABSENT`] if the key is missing or already expired (in which case
    /// the key is purged as a side effect — expiry is lazy, there is no
    /// background sweep).
    pub fn ttl_ms(&self, key: &str) -> i64 {
        if !self.keyspace.contains_key(key) {
            return ABSENT;
        }
        match self.ttls.get(key) {
            None => UNLIMITED,
            Some(expiry) => {
                let remaining = expiry - now_ms();
                if remaining <= 0 {
                    self.keyspace.remove(key);
                    self.ttls.remove(key);
                    ABSENT
                } else {
                    remaining
                }
            }
        }
    }

    /// Run `f` with every key in `keys` (deduplicated, lock-ordered
    /// ascending) exclusively locked for the duration of the call. `f` must
    /// be synchronous — no per-key lock is ever held across a suspension
    /// point.
    pub fn with_keys_locked<R>(&self, keys: &[String], f: impl FnOnce() -> R) -> R {
        self.locks.with_locked(keys, f)
    }

    /// Resolve `name` in `registry` and run its validator then executor
    /// against this database.
    pub fn exec(&self, registry: &CommandRegistry, conn: &ConnectionState, name: &str, args: &[Vec<u8>]) -> Response {
        let lower = name.to_ascii_lowercase();
        let Some(descriptor) = registry.lookup(&lower) else {
            return Response::Error(RudisError::UnknownCommand(name.to_string()).wire_message());
        };
        if let Err(e) = (descriptor.validator)(conn, args) {
            return Response::Error(e.wire_message());
        }
        (descriptor.executor)(conn, self, args)
    }
}

/// Per-key fair mutual exclusion, acquired on demand. Multi-key callers
/// must pre-sort keys ascending; this table itself only guarantees a
/// single key's mutex is unique and reclaimed once unreferenced.
struct KeyLockTable {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLockTable {
    fn new() -> Self {
        KeyLockTable { table: Mutex::new(HashMap::new()) }
    }

    fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap();
        table.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn release(&self, key: &str, mutex: Arc<Mutex<()>>) {
        let mut table = self.table.lock().unwrap();
        // Only the table and our local clone should be left referencing it.
        if Arc::strong_count(&mutex) <= 2 {
            table.remove(key);
        }
    }

    fn with_locked<R>(&self, keys: &[String], f: impl FnOnce() -> R) -> R {
        let mut sorted: Vec<String> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = sorted.iter().map(|k| self.acquire(k)).collect();
        let guards: Vec<_> = mutexes.iter().map(|m| m.lock().unwrap()).collect();
        let result = f();
        drop(guards);

        for (key, mutex) in sorted.iter().zip(mutexes.into_iter()) {
            self.release(key, mutex);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_absent_is_minus_two() {
        let db = Database::new(0);
        assert_eq!(db.ttl_ms("missing"), ABSENT);
    }

    #[test]
    fn ttl_unlimited_is_minus_one() {
        let db = Database::new(0);
        db.put("k".into(), RedisValue::Str(b"v".to_vec()));
        assert_eq!(db.ttl_ms("k"), UNLIMITED);
    }

    #[test]
    fn ttl_expiry_purges_key() {
        let db = Database::new(0);
        db.put("k".into(), RedisValue::Str(b"v".to_vec()));
        db.set_ttl("k", now_ms() - 1000);
        assert_eq!(db.ttl_ms("k"), ABSENT);
        assert!(!db.contains("k"));
    }

    #[test]
    fn lazy_expiry_on_get() {
        let db = Database::new(0);
        db.put("k".into(), RedisValue::Str(b"v".to_vec()));
        db.set_ttl("k", now_ms() - 1);
        assert!(db.get("k").is_none());
    }

    #[test]
    fn multi_key_lock_serializes() {
        use std::sync::atomic::{AtomicI64, Ordering};
        use std::thread;

        let db = Arc::new(Database::new(0));
        let counter = Arc::new(AtomicI64::new(0));
        let mut handles = Vec::new();
        for _ in 0..50 {
            let db = db.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                db.with_keys_locked(&["a".to_string(), "b".to_string()], || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
