// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An in-memory Adaptive Replacement Cache (ARC, Megiddo & Modha) over
//! `Cid -> bytes`, bounded by a byte budget rather than ARC's textbook entry
//! count.
//!
//! The four lists (`T1`/`T2` resident, `B1`/`B2` ghost) and the adaptive
//! target `p` are guarded by a single mutex; all list mutations are O(1)
//! amortized (the occasional `OrderedSet::remove` is the one O(n) fallback,
//! bounded by list length, same trade-off the teacher's descriptor table
//! makes for its LRU list).

mod list;

use crate::Cid;
use list::OrderedSet;
use std::sync::Arc;
use std::sync::Mutex;

/// A resident cache entry. Bytes are shared via `Arc` so an eviction never
/// invalidates a reader that is still holding the slice.
#[derive(Clone)]
struct CacheEntry {
    bytes: Arc<[u8]>,
    size_bytes: u64,
}

/// Point-in-time counters for [`ArcCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArcStats {
    /// Hits against resident (`T1`/`T2`) entries.
    pub hits: u64,
    /// Lookups that found nothing resident.
    pub misses: u64,
    /// Resident entries evicted to make room.
    pub evictions: u64,
    /// Bytes currently resident.
    pub bytes_used: u64,
    /// Current adaptive target `p`.
    pub p: f64,
}

/// Which resident list a victim was evicted from, which decides which
/// ghost list remembers it.
enum Source {
    T1,
    T2,
}

struct ArcInner {
    t1: OrderedSet,
    t2: OrderedSet,
    b1: OrderedSet,
    b2: OrderedSet,
    entries: rustc_hash::FxHashMap<Cid, CacheEntry>,
    pinned: rustc_hash::FxHashSet<Cid>,
    bytes_used: u64,
    p: f64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Whether `admit` placed the object because ARC's ghost lists already
/// remembered it (a `B1`/`B2` hit), which is useful for callers tracking
/// hit/miss semantics one level up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitKind {
    /// The CID was not in any list; a plain first-time admission.
    Fresh,
    /// The CID was found in a ghost list; `p` was adapted.
    GhostHit,
    /// The CID was already resident; this is a no-op touch, not a new entry.
    AlreadyResident,
}

/// A byte-budgeted ARC cache of `Cid -> bytes`.
pub struct ArcCache {
    inner: Mutex<ArcInner>,
    byte_budget: u64,
}

impl ArcCache {
    /// Creates an empty cache with the given byte budget.
    ///
    /// A budget of `0` means the cache immediately evicts everything it is
    /// given and `get` never hits; callers use this to disable the memory
    /// tier entirely (per spec §8, `B_mem = 0`).
    #[must_use]
    pub fn with_budget_bytes(byte_budget: u64) -> Self {
        Self {
            inner: Mutex::new(ArcInner {
                t1: OrderedSet::default(),
                t2: OrderedSet::default(),
                b1: OrderedSet::default(),
                b2: OrderedSet::default(),
                entries: rustc_hash::FxHashMap::default(),
                pinned: rustc_hash::FxHashSet::default(),
                bytes_used: 0,
                p: 0.0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            byte_budget,
        }
    }

    /// The configured byte budget.
    #[must_use]
    pub fn budget_bytes(&self) -> u64 {
        self.byte_budget
    }

    /// Current resident entry count: `|T1| + |T2|`. This plays the role of
    /// ARC's textbook fixed capacity `c`, but recomputed live, since this
    /// cache is byte- rather than entry-bounded (spec §4.4).
    fn resident_capacity(inner: &ArcInner) -> usize {
        inner.t1.len() + inner.t2.len()
    }

    /// Looks up a resident entry, promoting it per ARC rules. Ghost hits are
    /// not resolved here (there are no bytes to return); they are resolved
    /// by [`Self::admit`] once the caller has fetched the bytes.
    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<Arc<[u8]>> {
        let mut inner = self.inner.lock().expect("lock poisoned");

        if inner.t1.remove(cid) {
            inner.t2.push_mru(cid.clone());
            inner.hits += 1;
            return inner.entries.get(cid).map(|e| e.bytes.clone());
        }

        if inner.t2.contains(cid) {
            inner.t2.remove(cid);
            inner.t2.push_mru(cid.clone());
            inner.hits += 1;
            return inner.entries.get(cid).map(|e| e.bytes.clone());
        }

        inner.misses += 1;
        None
    }

    /// Admits `bytes` for `cid`, evicting resident entries as needed to stay
    /// within the byte budget. Returns `false` if the object could not be
    /// admitted because every resident entry is pinned and none could be
    /// freed (the cache is left unchanged in that case).
    pub fn admit(&self, cid: &Cid, bytes: Arc<[u8]>) -> (bool, AdmitKind) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let size = bytes.len() as u64;

        if inner.entries.contains_key(cid) {
            // Re-admission of an already-resident CID: touch it like a hit,
            // do not double-count size (round-trip law in spec §8).
            if inner.t1.remove(cid) {
                inner.t2.push_mru(cid.clone());
            } else if inner.t2.contains(cid) {
                inner.t2.remove(cid);
                inner.t2.push_mru(cid.clone());
            }
            return (true, AdmitKind::AlreadyResident);
        }

        let was_in_b1 = inner.b1.contains(cid);
        let was_in_b2 = !was_in_b1 && inner.b2.contains(cid);

        if was_in_b1 {
            let b1_len = inner.b1.len() as f64;
            let b2_len = inner.b2.len() as f64;
            let delta = if b1_len > 0.0 { (b2_len / b1_len).max(1.0) } else { 1.0 };
            let c = Self::resident_capacity(&inner) as f64;
            inner.p = (inner.p + delta).min(c);
            inner.b1.remove(cid);
        } else if was_in_b2 {
            let b1_len = inner.b1.len() as f64;
            let b2_len = inner.b2.len() as f64;
            let delta = if b2_len > 0.0 { (b1_len / b2_len).max(1.0) } else { 1.0 };
            inner.p = (inner.p - delta).max(0.0);
            inner.b2.remove(cid);
        }

        if !self.make_room(&mut inner, size) {
            // Could not free enough space (everything resident is pinned).
            // Undo the ghost-list removal so state stays consistent with
            // "admission did not happen".
            if was_in_b1 {
                inner.b1.push_mru(cid.clone());
            } else if was_in_b2 {
                inner.b2.push_mru(cid.clone());
            }
            return (false, AdmitKind::Fresh);
        }

        inner.entries.insert(
            cid.clone(),
            CacheEntry {
                bytes,
                size_bytes: size,
            },
        );
        inner.bytes_used += size;

        if was_in_b1 || was_in_b2 {
            inner.t2.push_mru(cid.clone());
            (true, AdmitKind::GhostHit)
        } else {
            inner.t1.push_mru(cid.clone());
            (true, AdmitKind::Fresh)
        }
    }

    /// Evicts resident entries until `bytes_used + incoming <= budget`,
    /// skipping pinned entries. Returns `false` if it ran out of evictable
    /// entries before reaching budget.
    fn make_room(&self, inner: &mut ArcInner, incoming: u64) -> bool {
        while inner.bytes_used + incoming > self.byte_budget {
            let prefer_t1 = !inner.t1.is_empty() && (inner.t1.len() as f64 > inner.p);

            // The ghost list a victim is pushed to reflects which list the
            // `p`-rule *intended* to shrink, not which list it was actually
            // popped from when the preferred one was empty.
            let victim = if prefer_t1 {
                Self::evict_from(&mut inner.t1, &inner.pinned)
                    .map(|cid| (cid, Source::T1))
                    .or_else(|| Self::evict_from(&mut inner.t2, &inner.pinned).map(|cid| (cid, Source::T1)))
            } else {
                Self::evict_from(&mut inner.t2, &inner.pinned)
                    .map(|cid| (cid, Source::T2))
                    .or_else(|| Self::evict_from(&mut inner.t1, &inner.pinned).map(|cid| (cid, Source::T2)))
            };

            let Some((cid, source)) = victim else {
                return false;
            };

            if let Some(entry) = inner.entries.remove(&cid) {
                inner.bytes_used -= entry.size_bytes;
                inner.evictions += 1;
            }

            match source {
                Source::T1 => inner.b1.push_mru(cid),
                Source::T2 => inner.b2.push_mru(cid),
            }

            let c = Self::resident_capacity(inner);
            Self::trim_ghosts(inner, c);
        }

        true
    }

    /// Pops the LRU of `list`, skipping (and rotating to MRU) pinned
    /// entries, bounded by the list's length so an all-pinned list
    /// terminates instead of looping forever.
    fn evict_from(list: &mut OrderedSet, pinned: &rustc_hash::FxHashSet<Cid>) -> Option<Cid> {
        let attempts = list.len();
        for _ in 0..attempts {
            let candidate = list.pop_lru()?;
            if pinned.contains(&candidate) {
                list.push_mru(candidate);
                continue;
            }
            return Some(candidate);
        }
        None
    }

    /// Trims ghost lists so `|T1|+|B1| <= c` and the combined four lists
    /// stay within `2c`, matching classic ARC's ghost-list bound.
    fn trim_ghosts(inner: &mut ArcInner, c: usize) {
        while inner.t1.len() + inner.b1.len() > c.max(1) {
            if inner.b1.pop_lru().is_none() {
                break;
            }
        }
        while inner.t1.len() + inner.t2.len() + inner.b1.len() + inner.b2.len() > 2 * c.max(1) {
            if inner.b2.pop_lru().is_none() && inner.b1.pop_lru().is_none() {
                break;
            }
        }
    }

    /// Unconditional removal, used for explicit invalidation. Does not
    /// touch the ghost lists (an invalidated CID is gone, not "recently
    /// evicted").
    pub fn remove(&self, cid: &Cid) {
        self.take(cid);
    }

    /// Removes `cid` if resident and returns its bytes, for callers (such as
    /// the compactor's demotion pass) that need to move the bytes elsewhere
    /// before they're dropped from memory.
    pub fn take(&self, cid: &Cid) -> Option<Arc<[u8]>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let bytes = inner.entries.remove(cid).map(|entry| {
            inner.bytes_used -= entry.size_bytes;
            entry.bytes
        });
        inner.t1.remove(cid);
        inner.t2.remove(cid);
        inner.pinned.remove(cid);
        bytes
    }

    /// Marks `cid` as exempt from eviction. No-op if not resident.
    pub fn set_pinned(&self, cid: &Cid, pinned: bool) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if pinned {
            inner.pinned.insert(cid.clone());
        } else {
            inner.pinned.remove(cid);
        }
    }

    /// Whether `cid` is currently resident (`T1` or `T2`).
    #[must_use]
    pub fn contains(&self, cid: &Cid) -> bool {
        let inner = self.inner.lock().expect("lock poisoned");
        inner.entries.contains_key(cid)
    }

    /// Current resident byte usage.
    #[must_use]
    pub fn bytes_used(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").bytes_used
    }

    /// A snapshot of hit/miss/eviction counters and ARC's adaptive state.
    #[must_use]
    pub fn snapshot_stats(&self) -> ArcStats {
        let inner = self.inner.lock().expect("lock poisoned");
        ArcStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            bytes_used: inner.bytes_used,
            p: inner.p,
        }
    }
}
