//! Keyed locks for per-patient ingest serialization and per-alert
//! transition atomicity.
//!
//! A `LockTable` tracks which keys are currently held. Acquisition polls
//! with a short sleep until the configured deadline, then fails `Busy` so
//! the caller can retry with backoff. Critical sections are short (one
//! store round-trip), so contention windows are small.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, PartialEq, Eq)]
pub enum LockError {
    /// Deadline elapsed while the key was held elsewhere.
    Busy,
    /// The table mutex was poisoned by a panicking holder.
    Poisoned,
}

pub struct LockTable<K: Eq + Hash + Clone> {
    held: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
        }
    }

    /// Acquire the lock for `key`, waiting at most `deadline`.
    pub fn acquire(&self, key: K, deadline: Duration) -> Result<KeyLock<'_, K>, LockError> {
        let started = Instant::now();
        loop {
            {
                let mut held = self.held.lock().map_err(|_| LockError::Poisoned)?;
                if held.insert(key.clone()) {
                    return Ok(KeyLock { table: self, key });
                }
            }
            if started.elapsed() >= deadline {
                return Err(LockError::Busy);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn release(&self, key: &K) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(key);
        }
    }
}

impl<K: Eq + Hash + Clone> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the key until dropped.
pub struct KeyLock<'a, K: Eq + Hash + Clone> {
    table: &'a LockTable<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for KeyLock<'_, K> {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reacquire_after_release() {
        let table: LockTable<u32> = LockTable::new();
        let guard = table.acquire(1, Duration::from_millis(10)).unwrap();
        drop(guard);
        assert!(table.acquire(1, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let table: LockTable<u32> = LockTable::new();
        let _a = table.acquire(1, Duration::from_millis(10)).unwrap();
        assert!(table.acquire(2, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn held_key_times_out_busy() {
        let table: Arc<LockTable<u32>> = Arc::new(LockTable::new());
        let _guard = table.acquire(1, Duration::from_millis(10)).unwrap();

        let table2 = Arc::clone(&table);
        let handle = std::thread::spawn(move || table2.acquire(1, Duration::from_millis(20)).err());
        assert_eq!(handle.join().unwrap(), Some(LockError::Busy));
    }

    #[test]
    fn waiter_gets_lock_once_freed() {
        let table: Arc<LockTable<u32>> = Arc::new(LockTable::new());
        let guard = table.acquire(1, Duration::from_millis(10)).unwrap();

        let table2 = Arc::clone(&table);
        let handle = std::thread::spawn(move || {
            table2.acquire(1, Duration::from_secs(2)).is_ok()
        });
        std::thread::sleep(Duration::from_millis(20));
        drop(guard);
        assert!(handle.join().unwrap());
    }
}
