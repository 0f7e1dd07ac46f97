//! In-process stores for dry runs and tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{MetadataStore, ObjectStore};
use crate::error::{StoreError, StoreResult};
use crate::types::MetadataRecord;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keeps objects in memory. Can be told to fail or slow down specific keys,
/// and records the peak number of concurrent `put` calls.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_patterns: Vec<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail any `put` whose key contains `pattern`.
    pub fn fail_when_key_contains(mut self, pattern: impl Into<String>) -> Self {
        self.fail_patterns.push(pattern.into());
        self
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored bytes and content type for a key.
    pub fn get(&self, key: &str) -> Option<(Bytes, String)> {
        lock(&self.objects).get(key).cloned()
    }

    /// Highest number of `put` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_patterns.iter().any(|p| key.contains(p.as_str())) {
            Err(StoreError::WriteFailed(format!("injected failure for {key}")))
        } else {
            lock(&self.objects).insert(key.to_string(), (bytes, content_type.to_string()));
            Ok(format!("memory://{key}"))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Keeps metadata records in memory.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<MetadataRecord>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `insert_many` always fails.
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<MetadataRecord> {
        lock(&self.records).clone()
    }

    /// Number of `insert_many` calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_many(&self, records: &[MetadataRecord]) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed(
                "metadata store unavailable".to_string(),
            ));
        }
        lock(&self.records).extend_from_slice(records);
        Ok(())
    }
}
