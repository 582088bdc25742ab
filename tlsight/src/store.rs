use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key was present and its value was overwritten.
    Replaced,
    /// The key was present and left alone.
    Occupied,
    /// The store is at capacity and the key is new; the value was dropped.
    Full,
}

/// Capacity-bounded map shared between concurrent units of work.
///
/// Every operation touches a single key and holds the lock only for its own
/// duration. A full store never grows and never waits: inserting a new key
/// drops the value, while existing keys can still be overwritten.
#[derive(Debug)]
pub struct BoundedStore<K, V> {
    entries: Mutex<HashMap<K, V>>,
    capacity: usize,
}

impl<K: Eq + Hash, V> BoundedStore<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert-or-replace.
    pub fn insert(&self, key: K, value: V) -> InsertOutcome {
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.get_mut(&key) {
            *slot = value;
            return InsertOutcome::Replaced;
        }
        if entries.len() >= self.capacity {
            return InsertOutcome::Full;
        }
        entries.insert(key, value);
        InsertOutcome::Inserted
    }

    /// Inserts only if the key is absent.
    pub fn insert_new(&self, key: K, value: V) -> InsertOutcome {
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return InsertOutcome::Occupied;
        }
        if entries.len() >= self.capacity {
            return InsertOutcome::Full;
        }
        entries.insert(key, value);
        InsertOutcome::Inserted
    }

    /// Removes the entry and hands it back.
    pub fn take(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
