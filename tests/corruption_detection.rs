//! Scenario 6: a bit-flipped object file on disk is detected via its stored
//! checksum, the corrupt file is removed, and the read transparently falls
//! back to an upstream refetch rather than surfacing as a hard error.

mod support;

use support::{find_object_file, InMemoryStore};
use tiered_cache::{CacheConfig, Cid, TieredCache};

#[test]
fn corrupted_disk_object_is_removed_and_served_via_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    let cid = Cid::parse("will-be-corrupted").unwrap();
    store.insert(cid.clone(), b"original bytes".to_vec());

    // A tiny memory budget so the object lands on disk and the next get
    // cannot be satisfied straight out of the memory tier.
    let cfg = CacheConfig::new(dir.path()).memory_budget_bytes(0);
    let cache = TieredCache::open(cfg, store).unwrap();

    cache.get(&cid).unwrap();

    let path = find_object_file(dir.path(), &cid);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let refetched = cache.get(&cid).unwrap();
    assert_eq!(&*refetched, b"original bytes");

    let snap = cache.metrics();
    assert!(snap.disk_errors >= 1, "the corruption must be counted");

    cache.close().unwrap();
}
