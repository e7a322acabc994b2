//! Scenario 3: a cold, memory-resident object is demoted to disk-only by the
//! compactor once it has been idle past `idle_grace` and its heat has
//! dropped below `heat_demote`; reading it again promotes it back to
//! memory.

mod support;

use std::time::Duration;
use support::InMemoryStore;
use tiered_cache::{CacheConfig, Cid, ManualClock, TieredCache};

#[test]
fn cold_memory_entry_demotes_to_disk_then_repromotes_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    let cid = Cid::parse("demote-me").unwrap();
    store.insert(cid.clone(), b"payload bytes".to_vec());

    let cfg = CacheConfig::new(dir.path())
        .heat_demote(1.1)
        .idle_grace(Duration::from_millis(0));
    let clock = ManualClock::new(1_000);
    let cache = TieredCache::open_with_clock(cfg, store, clock).unwrap();

    cache.get(&cid).unwrap();
    cache.run_compaction_pass().unwrap();

    let snap = cache.metrics();
    assert!(snap.mem_evictions >= 1, "the object should have been demoted out of memory");
    assert!(snap.disk_bytes_used > 0, "the demoted object must land on disk");

    let bytes = cache.get(&cid).unwrap();
    assert_eq!(&*bytes, b"payload bytes");

    cache.close().unwrap();
}
