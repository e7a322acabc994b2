//! Scenario 2: under memory pressure the ARC tier evicts cold entries, and a
//! previously evicted CID remains fetchable and is re-admitted on its next
//! access (the ARC ghost-list machinery that drives this is internal to
//! `arc_cache` and covered directly by its own unit tests; this test only
//! asserts the externally observable contract: bytes stay within budget and
//! eviction never loses data permanently).

mod support;

use support::InMemoryStore;
use tiered_cache::{CacheConfig, Cid, TieredCache};

#[test]
fn memory_pressure_evicts_and_evicted_cids_stay_fetchable() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();

    let cids: Vec<Cid> = (0..8).map(|i| Cid::parse(&format!("item-{i}")).unwrap()).collect();
    for cid in &cids {
        store.insert(cid.clone(), vec![0u8; 64]);
    }

    // Budget only fits ~3 items; the remaining 5 admissions force eviction.
    let cfg = CacheConfig::new(dir.path()).memory_budget_bytes(200);
    let cache = TieredCache::open(cfg, store).unwrap();

    for cid in &cids {
        cache.get(cid).unwrap();
    }

    assert!(cache.metrics().mem_bytes_used <= 200);
    assert!(cache.metrics().mem_evictions > 0, "filling past budget must evict something");

    // The very first CID was almost certainly evicted by now; it must still
    // be fetchable (either from disk or by re-fetching upstream), never lost.
    let first = cache.get(&cids[0]).unwrap();
    assert_eq!(first.len(), 64);

    cache.close().unwrap();
}
