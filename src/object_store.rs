// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The narrow interface onto the upstream content-addressed network/daemon.
//!
//! This crate never implements an `ObjectStore` itself; the underlying
//! content-addressed daemon, its transport, and its CID verification are
//! explicitly out of scope (see spec §1) and are supplied by the caller.

use crate::Cid;
use std::time::Duration;

/// The external collaborator that resolves cache misses.
///
/// The core assumes bytes returned by `fetch` are authoritative for the
/// given CID and does not re-verify them unless
/// [`crate::CacheConfig::verify_on_fetch`] is enabled.
pub trait ObjectStore: Send + Sync {
    /// Fetches the canonical bytes for `cid`, blocking the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the object store has no such
    /// CID, [`crate::Error::Timeout`] if `deadline` elapses first, or
    /// [`crate::Error::Io`] on a transport failure.
    fn fetch(&self, cid: &Cid, deadline: Option<Duration>) -> crate::Result<Vec<u8>>;

    /// Cheap existence check, used only by diagnostics.
    ///
    /// The default implementation answers `true` iff a `fetch` succeeds,
    /// which is correct but not necessarily cheap; implementations backed by
    /// a real daemon should override this with a dedicated existence probe.
    fn has(&self, cid: &Cid) -> bool {
        self.fetch(cid, None).is_ok()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeObjectStore;
    use super::ObjectStore;
    use crate::Cid;

    #[test]
    fn fake_store_counts_calls_per_cid() {
        let store = FakeObjectStore::new();
        let cid = Cid::parse("a").unwrap();
        store.insert(cid.clone(), b"hello".to_vec());

        assert_eq!(store.fetch(&cid, None).unwrap(), b"hello");
        assert_eq!(store.fetch(&cid, None).unwrap(), b"hello");
        assert_eq!(store.call_count(&cid), 2);
        assert_eq!(store.total_calls(), 2);
    }

    #[test]
    fn fake_store_reports_not_found() {
        let store = FakeObjectStore::new();
        let cid = Cid::parse("missing").unwrap();
        assert!(matches!(store.fetch(&cid, None), Err(crate::Error::NotFound)));
    }

    #[test]
    fn has_default_impl_delegates_to_fetch() {
        let store = FakeObjectStore::new();
        let cid = Cid::parse("a").unwrap();
        assert!(!store.has(&cid));
        store.insert(cid.clone(), b"x".to_vec());
        assert!(store.has(&cid));
    }
}
