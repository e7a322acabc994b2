//! Scenario 4: many threads racing to read the same cold CID trigger at most
//! one upstream fetch; everyone observes the same bytes.

mod support;

use std::sync::Arc;
use std::time::Duration;
use support::SlowStore;
use tiered_cache::{CacheConfig, Cid, TieredCache};

#[test]
fn concurrent_readers_of_a_cold_cid_share_one_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let store = SlowStore::new(Duration::from_millis(50));
    let cid = Cid::parse("shared-cold-cid").unwrap();
    store.insert(cid.clone(), b"race me".to_vec());
    let calls = store.call_counter();

    let cache = Arc::new(TieredCache::open(CacheConfig::new(dir.path()), store).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let cid = cid.clone();
            std::thread::spawn(move || cache.get(&cid).unwrap())
        })
        .collect();

    for handle in handles {
        let bytes = handle.join().unwrap();
        assert_eq!(&*bytes, b"race me");
    }

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(cache.metrics().fetches, 1);

    cache.close().unwrap();
}
