// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Content-addressed on-disk object store, sharded by CID prefix, read back
//! zero-copy via `memmap2`.
//!
//! Layout: `<root>/objects/<aa>/<bb>/<cid>`, where `aa`/`bb` are two-character
//! shards from [`Cid::shard_prefixes`]. Each file is
//! `[MAGIC; 4][checksum; 16][...payload]`; the header lets `get` detect bit
//! rot without consulting the metadata index.

mod mapped;

pub use mapped::MappedRegion;

use crate::checksum::Checksum;
use crate::file::{self, OBJECTS_FOLDER};
use crate::Cid;
use mapped::MappedObject;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

const MAGIC: &[u8; 4] = b"OBJ1";
const HEADER_LEN: usize = MAGIC.len() + std::mem::size_of::<u128>();

/// A content-addressed, byte-budgeted on-disk object store.
pub struct DiskTier {
    root: PathBuf,
    budget_bytes: u64,
    used_bytes: AtomicU64,
    sizes: Mutex<rustc_hash::FxHashMap<Cid, u64>>,
    open: Mutex<rustc_hash::FxHashMap<Cid, Weak<MappedObject>>>,
}

impl DiskTier {
    /// Opens (creating if absent) a disk tier rooted at `root`, with a soft
    /// byte budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the `objects` directory cannot be created.
    pub fn open(root: impl Into<PathBuf>, budget_bytes: u64) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(OBJECTS_FOLDER))?;

        Ok(Self {
            root,
            budget_bytes,
            used_bytes: AtomicU64::new(0),
            sizes: Mutex::new(rustc_hash::FxHashMap::default()),
            open: Mutex::new(rustc_hash::FxHashMap::default()),
        })
    }

    fn object_path(&self, cid: &Cid) -> PathBuf {
        let (a, b) = cid.shard_prefixes();
        self.root.join(OBJECTS_FOLDER).join(a).join(b).join(cid.as_str())
    }

    /// Writes `bytes` for `cid` atomically. Returns `Err(OverBudget)` if this
    /// would exceed the disk budget; the caller is expected to evict first
    /// and retry (this tier never evicts on its own, see spec §4.5).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OverBudget`] or [`crate::Error::Io`].
    pub fn put(&self, cid: &Cid, bytes: &[u8]) -> crate::Result<u64> {
        let size = bytes.len() as u64;

        let previous = self.sizes.lock().expect("lock poisoned").get(cid).copied();
        let projected = self.used_bytes.load(Ordering::Acquire) - previous.unwrap_or(0) + size;
        if projected > self.budget_bytes {
            return Err(crate::Error::OverBudget);
        }

        let path = self.object_path(cid);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let checksum = Checksum::digest(bytes);
        let mut content = Vec::with_capacity(HEADER_LEN + bytes.len());
        content.extend_from_slice(MAGIC);
        content.extend_from_slice(&checksum.into_u128().to_le_bytes());
        content.extend_from_slice(bytes);

        file::rewrite_atomic(&path, &content)?;

        let mut sizes = self.sizes.lock().expect("lock poisoned");
        if let Some(prev) = sizes.insert(cid.clone(), size) {
            self.used_bytes.fetch_sub(prev, Ordering::AcqRel);
        }
        self.used_bytes.fetch_add(size, Ordering::AcqRel);

        // A stale mapping from before this overwrite must not be reused.
        self.open.lock().expect("lock poisoned").remove(cid);

        Ok(size)
    }

    /// Returns a zero-copy, memory-mapped view of `cid`'s bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if absent, [`crate::Error::Corrupted`]
    /// if the stored checksum does not match (the offending file is removed
    /// before the error is returned), or [`crate::Error::Io`] on I/O failure.
    pub fn get(&self, cid: &Cid) -> crate::Result<MappedRegion> {
        if let Some(region) = self.upgrade_open(cid) {
            return Ok(region);
        }

        let path = self.object_path(cid);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(crate::Error::NotFound)
            }
            Err(err) => return Err(err.into()),
        };

        #[expect(unsafe_code, reason = "memmap2's API is inherently unsafe: the backing file must not be mutated externally while mapped")]
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_LEN || &mmap[0..4] != MAGIC {
            drop(mmap);
            let _ = std::fs::remove_file(&path);
            return Err(crate::Error::Corrupted {
                got: Checksum::from_raw(0),
                expected: Checksum::from_raw(0),
            });
        }

        let mut raw = [0u8; 16];
        raw.copy_from_slice(&mmap[4..HEADER_LEN]);
        let expected = Checksum::from_raw(u128::from_le_bytes(raw));
        let got = Checksum::digest(&mmap[HEADER_LEN..]);

        if let Err(err) = got.check(expected) {
            drop(mmap);
            let _ = std::fs::remove_file(&path);
            log::warn!("corrupted object {cid}, removed");
            return Err(err);
        }

        let object = Arc::new(MappedObject {
            path,
            mmap,
            payload_offset: HEADER_LEN,
            unlink_on_drop: AtomicBool::new(false),
        });

        self.open
            .lock()
            .expect("lock poisoned")
            .insert(cid.clone(), Arc::downgrade(&object));

        Ok(MappedRegion(object))
    }

    fn upgrade_open(&self, cid: &Cid) -> Option<MappedRegion> {
        self.open
            .lock()
            .expect("lock poisoned")
            .get(cid)
            .and_then(Weak::upgrade)
            .map(MappedRegion)
    }

    /// Whether `cid` has an object file present.
    #[must_use]
    pub fn has(&self, cid: &Cid) -> bool {
        self.object_path(cid).is_file()
    }

    /// Marks `cid` for deletion. If a mapping is currently live, the actual
    /// unlink is deferred until that mapping's last reference is dropped.
    pub fn remove(&self, cid: &Cid) {
        let mut open = self.open.lock().expect("lock poisoned");
        if let Some(object) = open.remove(cid).and_then(|weak| weak.upgrade()) {
            object.unlink_on_drop.store(true, Ordering::Release);
        } else {
            drop(open);
            let _ = std::fs::remove_file(self.object_path(cid));
        }

        let mut sizes = self.sizes.lock().expect("lock poisoned");
        if let Some(size) = sizes.remove(cid) {
            self.used_bytes.fetch_sub(size, Ordering::AcqRel);
        }
    }

    /// Total bytes currently tracked as resident on disk.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Acquire)
    }

    /// The configured soft byte budget.
    #[must_use]
    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    /// Recomputes the checksum for `cid` without going through the mapped-
    /// region cache, for opportunistic background verification.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] or [`crate::Error::Corrupted`].
    pub fn verify(&self, cid: &Cid) -> crate::Result<()> {
        let path = self.object_path(cid);
        let content = std::fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                crate::Error::NotFound
            } else {
                crate::Error::Io(err)
            }
        })?;

        if content.len() < HEADER_LEN || &content[0..4] != MAGIC {
            return Err(crate::Error::Corrupted {
                got: Checksum::from_raw(0),
                expected: Checksum::from_raw(0),
            });
        }

        let mut raw = [0u8; 16];
        raw.copy_from_slice(&content[4..HEADER_LEN]);
        let expected = Checksum::from_raw(u128::from_le_bytes(raw));
        Checksum::digest(&content[HEADER_LEN..]).check(expected)
    }

    #[cfg(test)]
    fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> Cid {
        Cid::parse(s).unwrap()
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        let a = cid("abcd1234");

        tier.put(&a, b"hello world").unwrap();
        let region = tier.get(&a).unwrap();
        assert_eq!(&*region, b"hello world");
        assert!(tier.has(&a));
    }

    #[test]
    fn get_on_absent_cid_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        assert!(matches!(tier.get(&cid("nope")), Err(crate::Error::NotFound)));
    }

    #[test]
    fn over_budget_put_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 4).unwrap();
        assert!(matches!(
            tier.put(&cid("a"), b"way too big"),
            Err(crate::Error::OverBudget)
        ));
    }

    #[test]
    fn corrupted_file_is_detected_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        let a = cid("zz");
        tier.put(&a, b"payload").unwrap();

        let path = tier.object_path(&a);
        let mut content = std::fs::read(&path).unwrap();
        let last = content.len() - 1;
        content[last] ^= 0xFF;
        std::fs::write(&path, content).unwrap();

        assert!(matches!(tier.get(&a), Err(crate::Error::Corrupted { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn remove_defers_unlink_while_mapping_is_live() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        let a = cid("defer");
        tier.put(&a, b"payload").unwrap();

        let region = tier.get(&a).unwrap();
        let path = tier.object_path(&a);
        tier.remove(&a);
        assert!(path.exists(), "file should still exist while region is live");

        drop(region);
        assert!(!path.exists(), "file should be unlinked once the mapping drops");
    }

    #[test]
    fn remove_without_live_mapping_unlinks_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        let a = cid("imm");
        tier.put(&a, b"payload").unwrap();
        let path = tier.object_path(&a);

        tier.remove(&a);
        assert!(!path.exists());
        assert_eq!(tier.total_bytes(), 0);
    }

    #[test]
    fn put_overwrite_updates_size_and_invalidates_old_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let tier = DiskTier::open(dir.path(), 1_000).unwrap();
        let a = cid("ow");
        tier.put(&a, b"short").unwrap();
        tier.put(&a, b"a longer payload").unwrap();

        let region = tier.get(&a).unwrap();
        assert_eq!(&*region, b"a longer payload");
        assert_eq!(tier.total_bytes(), "a longer payload".len() as u64);
    }
}
