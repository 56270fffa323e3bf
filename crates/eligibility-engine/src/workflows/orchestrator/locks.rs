use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Hands out one mutex per entity key so events for the same consumer never interleave,
/// while different consumers proceed in parallel. Entries live only while a caller holds
/// or waits on them, so the table stays bounded by the number of in-flight keys.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, work: impl FnOnce() -> T) -> T {
        let handle = self.handle(key);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };
        self.release(key, handle);
        result
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        self.table()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the entry once nobody besides the table and this caller refers to it. New
    /// handles are only cloned under the table lock, so the count cannot grow meanwhile.
    fn release(&self, key: &str, handle: Arc<Mutex<()>>) {
        let mut table = self.table();
        if Arc::strong_count(&handle) == 2 {
            table.remove(key);
        }
    }
}
