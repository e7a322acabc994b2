// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A columnar, Parquet-durable table of [`MetadataRecord`]s keyed by CID.
//!
//! The in-memory source of truth is a row vector plus a hash index for O(1)
//! point lookup (the same pairing the teacher uses: a fast hash map in front
//! of an on-disk columnar/sorted representation). `flush` only ever
//! serializes the rows touched since the last flush into a fresh partition;
//! `compact` periodically folds all partitions into one, mirroring the
//! teacher's memtable-flush/segment-compaction split.

mod parquet_io;
mod record;
mod schema;

pub use record::MetadataRecord;

use crate::file::{self, INDEX_FOLDER, MANIFEST_FILE};
use crate::Cid;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Above this many partitions, the next flush triggers a compaction pass.
const COMPACT_THRESHOLD: usize = 8;

struct IndexInner {
    records: Vec<MetadataRecord>,
    by_cid: rustc_hash::FxHashMap<Cid, usize>,
    dirty: rustc_hash::FxHashSet<Cid>,
    partitions: Vec<String>,
}

impl IndexInner {
    fn get_mut(&mut self, cid: &Cid) -> Option<&mut MetadataRecord> {
        let idx = *self.by_cid.get(cid)?;
        self.records.get_mut(idx)
    }

    fn upsert(&mut self, record: MetadataRecord) {
        let cid = record.cid.clone();
        if let Some(&idx) = self.by_cid.get(&cid) {
            if let Some(slot) = self.records.get_mut(idx) {
                *slot = record;
            }
        } else {
            self.by_cid.insert(cid, self.records.len());
            self.records.push(record);
        }
    }

    fn remove(&mut self, cid: &Cid) -> Option<MetadataRecord> {
        let idx = self.by_cid.remove(cid)?;
        let removed = self.records.swap_remove(idx);
        if let Some(moved) = self.records.get(idx) {
            self.by_cid.insert(moved.cid.clone(), idx);
        }
        Some(removed)
    }
}

/// The durable, queryable metadata table.
pub struct MetadataIndex {
    root: PathBuf,
    inner: Mutex<IndexInner>,
    next_partition: AtomicU64,
}

impl MetadataIndex {
    /// Opens the index at `root`, loading any existing partitions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if `<root>/index` cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(INDEX_FOLDER))?;

        let index = Self {
            root,
            inner: Mutex::new(IndexInner {
                records: Vec::new(),
                by_cid: rustc_hash::FxHashMap::default(),
                dirty: rustc_hash::FxHashSet::default(),
                partitions: Vec::new(),
            }),
            next_partition: AtomicU64::new(0),
        };

        index.load()?;
        Ok(index)
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_FOLDER)
    }

    fn manifest_path(&self) -> PathBuf {
        self.index_dir().join(MANIFEST_FILE)
    }

    fn partition_path(&self, name: &str) -> PathBuf {
        self.index_dir().join(name)
    }

    /// Point lookup by CID.
    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<MetadataRecord> {
        let inner = self.inner.lock().expect("lock poisoned");
        inner.by_cid.get(cid).and_then(|&idx| inner.records.get(idx)).cloned()
    }

    /// Atomic read-modify-write. `mutator` receives the existing record, or
    /// a fresh default-ish record if this CID is new (`default` is invoked
    /// lazily, only on miss).
    pub fn put_or_update(
        &self,
        cid: &Cid,
        default: impl FnOnce() -> MetadataRecord,
        mutator: impl FnOnce(&mut MetadataRecord),
    ) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(record) = inner.get_mut(cid) {
            mutator(record);
        } else {
            let mut record = default();
            mutator(&mut record);
            inner.upsert(record);
        }
        inner.dirty.insert(cid.clone());
    }

    /// Mutates an existing record in place. No-op (returns `false`) if `cid`
    /// has no record, unlike `put_or_update` which would materialize one.
    pub fn update_if_present(&self, cid: &Cid, mutator: impl FnOnce(&mut MetadataRecord)) -> bool {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(record) = inner.get_mut(cid) {
            mutator(record);
            inner.dirty.insert(cid.clone());
            true
        } else {
            false
        }
    }

    /// Removes a record entirely (not the same as `invalidate`, which only
    /// clears tier flags; this is used for retention purging).
    pub fn remove(&self, cid: &Cid) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.remove(cid);
        inner.dirty.remove(cid);
    }

    /// Linear scan returning every record matching `predicate`.
    #[must_use]
    pub fn scan(&self, predicate: impl Fn(&MetadataRecord) -> bool) -> Vec<MetadataRecord> {
        let inner = self.inner.lock().expect("lock poisoned");
        inner.records.iter().filter(|r| predicate(r)).cloned().collect()
    }

    /// Updates access bookkeeping and recomputed heat for `cid`.
    pub fn mark_access(&self, cid: &Cid, now_ms: u64, cfg: &crate::config::CacheConfig) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(record) = inner.get_mut(cid) {
            record.last_accessed = now_ms;
            record.access_count += 1;
            record.heat = crate::heat::heat(record, now_ms, cfg);
            inner.dirty.insert(cid.clone());
        }
    }

    /// Number of records currently tracked (resident or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").records.len()
    }

    /// Whether the index has no tracked records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes every record dirtied since the last flush into a new Parquet
    /// partition, then atomically republishes the manifest. No-op if
    /// nothing is dirty. Triggers [`Self::compact`] if the partition count
    /// has grown past [`COMPACT_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::Index`].
    pub fn flush(&self) -> crate::Result<()> {
        let (batch, partition_name, should_compact) = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            if inner.dirty.is_empty() {
                return Ok(());
            }

            let rows: Vec<MetadataRecord> = inner
                .dirty
                .iter()
                .filter_map(|cid| inner.by_cid.get(cid).and_then(|&idx| inner.records.get(idx)).cloned())
                .collect();

            let id = self.next_partition.fetch_add(1, Ordering::AcqRel);
            let name = format!("part-{id:020}.parquet");

            inner.dirty.clear();
            inner.partitions.push(name.clone());
            let should_compact = inner.partitions.len() > COMPACT_THRESHOLD;

            (rows, name, should_compact)
        };

        parquet_io::write_partition(&self.partition_path(&partition_name), &batch)?;
        self.rewrite_manifest()?;

        if should_compact {
            self.compact()?;
        }

        Ok(())
    }

    /// Folds every partition into a single fresh one containing the full
    /// current table, then removes the superseded files. Always leaves the
    /// manifest and on-disk state crash-consistent: the new partition is
    /// written and published before old ones are unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] or [`crate::Error::Index`].
    pub fn compact(&self) -> crate::Result<()> {
        let (all_rows, old_partitions, new_name) = {
            let inner = self.inner.lock().expect("lock poisoned");
            let rows = inner.records.clone();
            let old = inner.partitions.clone();
            let id = self.next_partition.fetch_add(1, Ordering::AcqRel);
            (rows, old, format!("part-{id:020}.parquet"))
        };

        parquet_io::write_partition(&self.partition_path(&new_name), &all_rows)?;

        {
            let mut inner = self.inner.lock().expect("lock poisoned");
            inner.partitions = vec![new_name];
        }
        self.rewrite_manifest()?;

        for old in old_partitions {
            let path = self.partition_path(&old);
            if let Err(err) = std::fs::remove_file(&path) {
                log::warn!("failed to remove superseded partition {path:?}: {err}");
            }
        }

        Ok(())
    }

    fn rewrite_manifest(&self) -> crate::Result<()> {
        let partitions = self.inner.lock().expect("lock poisoned").partitions.clone();
        let content = partitions.join("\n");
        file::rewrite_atomic(&self.manifest_path(), content.as_bytes())?;
        Ok(())
    }

    /// Reloads the in-memory table from every partition named in the
    /// manifest, in order (later partitions win ties on the same CID). A
    /// single corrupt partition is skipped with a warning rather than
    /// failing the whole load.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] only if the manifest itself cannot be
    /// read despite existing (a corrupt manifest, not a missing one).
    pub fn load(&self) -> crate::Result<()> {
        let manifest_path = self.manifest_path();
        if !manifest_path.is_file() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&manifest_path)?;
        let partitions: Vec<String> = content.lines().map(str::to_string).filter(|l| !l.is_empty()).collect();

        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.records.clear();
        inner.by_cid.clear();
        inner.dirty.clear();

        for name in &partitions {
            match parquet_io::read_partition(&self.partition_path(name)) {
                Ok(rows) => {
                    for row in rows {
                        inner.upsert(row);
                    }
                }
                Err(err) => {
                    log::warn!("skipping corrupt metadata partition {name}: {err}");
                }
            }
        }

        inner.partitions = partitions;
        let max_id = inner
            .partitions
            .iter()
            .filter_map(|p| p.strip_prefix("part-")?.strip_suffix(".parquet")?.parse::<u64>().ok())
            .max();
        drop(inner);

        if let Some(max_id) = max_id {
            self.next_partition.store(max_id + 1, Ordering::Release);
        }

        Ok(())
    }

    #[cfg(test)]
    fn index_root(&self) -> &Path {
        &self.root
    }
}
