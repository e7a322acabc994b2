//! Scenario 5: closing and reopening a cache against the same root directory
//! preserves on-disk objects and their metadata; only the in-memory tier is
//! volatile and starts cold again.

mod support;

use support::InMemoryStore;
use tiered_cache::{CacheConfig, Cid, TieredCache};

#[test]
fn reopened_cache_serves_prior_objects_without_touching_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let cid = Cid::parse("survives-a-restart").unwrap();

    {
        let store = InMemoryStore::new();
        store.insert(cid.clone(), b"durable payload".to_vec());
        let cache = TieredCache::open(CacheConfig::new(dir.path()), store).unwrap();

        let bytes = cache.get(&cid).unwrap();
        assert_eq!(&*bytes, b"durable payload");
        cache.close().unwrap();
    }

    // A fresh store with nothing in it: if the reopened cache had to fall
    // back to fetching, this would fail with NotFound instead of serving
    // the object from disk.
    let empty_store = InMemoryStore::new();
    let call_counts = empty_store.call_counts_handle();
    let cache = TieredCache::open(CacheConfig::new(dir.path()), empty_store).unwrap();

    let bytes = cache.get(&cid).unwrap();
    assert_eq!(&*bytes, b"durable payload");
    assert_eq!(
        *call_counts.lock().unwrap().get(&cid).unwrap_or(&0),
        0,
        "a reopened cache must serve disk-resident objects without touching upstream"
    );

    cache.close().unwrap();
}
