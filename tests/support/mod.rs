//! Shared test double for the integration tests in this directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiered_cache::{Cid, Error, ObjectStore, Result};

/// An in-memory upstream object store, counting calls per CID so
/// concurrency tests can assert dedup behavior. The call-count table lives
/// behind an `Arc` so a caller can keep a handle to it after the store
/// itself is moved into a `TieredCache`.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<Cid, Vec<u8>>>,
    call_counts: Arc<Mutex<HashMap<Cid, u64>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cid: Cid, bytes: Vec<u8>) {
        self.data.lock().expect("lock poisoned").insert(cid, bytes);
    }

    pub fn call_count(&self, cid: &Cid) -> u64 {
        *self
            .call_counts
            .lock()
            .expect("lock poisoned")
            .get(cid)
            .unwrap_or(&0)
    }

    /// A cloneable handle to this store's call-count table, usable after
    /// the store itself has been moved into a `TieredCache`.
    pub fn call_counts_handle(&self) -> Arc<Mutex<HashMap<Cid, u64>>> {
        self.call_counts.clone()
    }
}

impl ObjectStore for InMemoryStore {
    fn fetch(&self, cid: &Cid, _deadline: Option<Duration>) -> Result<Vec<u8>> {
        *self
            .call_counts
            .lock()
            .expect("lock poisoned")
            .entry(cid.clone())
            .or_insert(0) += 1;

        self.data
            .lock()
            .expect("lock poisoned")
            .get(cid)
            .cloned()
            .ok_or(Error::NotFound)
    }
}

/// A store backed by a single slow fetch, used to widen the race window for
/// concurrent-fetch-dedup tests. The call counter is behind an `Arc` so the
/// caller can keep a handle to it after the store itself is moved into a
/// `TieredCache`.
pub struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
    calls: std::sync::Arc<AtomicU64>,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryStore::new(),
            delay,
            calls: std::sync::Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn insert(&self, cid: Cid, bytes: Vec<u8>) {
        self.inner.insert(cid, bytes);
    }

    pub fn call_counter(&self) -> std::sync::Arc<AtomicU64> {
        self.calls.clone()
    }
}

impl ObjectStore for SlowStore {
    fn fetch(&self, cid: &Cid, deadline: Option<Duration>) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.fetch(cid, deadline)
    }
}

/// Locates the on-disk object file for `cid` by walking `<root>/objects`
/// (the sharding scheme itself is a crate-internal detail, so tests find
/// the file by name rather than reconstructing the shard path).
pub fn find_object_file(root: &std::path::Path, cid: &Cid) -> std::path::PathBuf {
    fn walk(dir: &std::path::Path, name: &str) -> Option<std::path::PathBuf> {
        for entry in std::fs::read_dir(dir).ok()?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Some(found) = walk(&path, name) {
                    return Some(found);
                }
            } else if path.file_name().and_then(|n| n.to_str()) == Some(name) {
                return Some(path);
            }
        }
        None
    }

    walk(&root.join("objects"), cid.as_str()).expect("object file must exist on disk")
}
