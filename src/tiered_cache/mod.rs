// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! [`TieredCache`]: the orchestrator composing [`crate::ArcCache`],
//! [`crate::DiskTier`], and [`crate::MetadataIndex`] into the read/admission
//! protocol described at the crate root.

mod in_flight;

use crate::checksum::Checksum;
use crate::config::CacheConfig;
use crate::heat;
use crate::metadata_index::{MetadataIndex, MetadataRecord};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::object_store::ObjectStore;
use crate::stop_signal::StopSignal;
use crate::time::{Clock, SystemClock};
use crate::{ArcCache, Cid, DiskTier};
use in_flight::{InFlightTable, Lease};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct Shared<S, C> {
    config: CacheConfig,
    memory: ArcCache,
    disk: DiskTier,
    index: MetadataIndex,
    metrics: Metrics,
    clock: C,
    store: S,
    in_flight: InFlightTable,
}

/// Composes the memory tier, disk tier, and metadata index into a single
/// content-addressed cache in front of an [`ObjectStore`].
pub struct TieredCache<S: ObjectStore + 'static, C: Clock + 'static = SystemClock> {
    shared: Arc<Shared<S, C>>,
    stop: StopSignal,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ObjectStore + 'static> TieredCache<S, SystemClock> {
    /// Opens a cache rooted at `config.path()`, backed by `store`, using the
    /// system wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory or metadata index cannot be
    /// created.
    pub fn open(config: CacheConfig, store: S) -> crate::Result<Self> {
        Self::open_with_clock(config, store, SystemClock)
    }
}

impl<S: ObjectStore + 'static, C: Clock + 'static> TieredCache<S, C> {
    /// Opens a cache with an injected [`Clock`], for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory or metadata index cannot be
    /// created.
    pub fn open_with_clock(config: CacheConfig, store: S, clock: C) -> crate::Result<Self> {
        std::fs::create_dir_all(config.path())?;

        let disk = DiskTier::open(config.path(), config.disk_budget_bytes)?;
        let memory = ArcCache::with_budget_bytes(config.memory_budget_bytes);
        let index = MetadataIndex::open(config.path())?;

        let shared = Arc::new(Shared {
            config,
            memory,
            disk,
            index,
            metrics: Metrics::default(),
            clock,
            store,
            in_flight: InFlightTable::default(),
        });

        let stop = StopSignal::default();
        let worker = spawn_compactor(shared.clone(), stop.clone());

        Ok(Self {
            shared,
            stop,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Resolves `cid` through the tier hierarchy, fetching from the object
    /// store on a full miss. Equivalent to `get_deadline(cid, None)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`], [`crate::Error::Timeout`], or
    /// [`crate::Error::Io`] as produced by the object store.
    pub fn get(&self, cid: &Cid) -> crate::Result<Arc<[u8]>> {
        self.get_deadline(cid, None)
    }

    /// Resolves `cid`, applying `deadline` to the upstream fetch if a miss
    /// reaches the object store (falls back to
    /// [`CacheConfig::fetch_deadline`] if `None`).
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn get_deadline(&self, cid: &Cid, deadline: Option<Duration>) -> crate::Result<Arc<[u8]>> {
        let now = self.shared.clock.now_ms();

        if let Some(bytes) = self.shared.memory.get(cid) {
            self.shared.index.mark_access(cid, now, &self.shared.config);
            self.shared.metrics.record_mem_hit(bytes.len() as u64);
            return Ok(bytes);
        }

        match self.shared.disk.get(cid) {
            Ok(region) => {
                let bytes: Arc<[u8]> = Arc::from(&*region);
                self.shared.index.mark_access(cid, now, &self.shared.config);
                self.shared.metrics.record_disk_hit(bytes.len() as u64);

                let heat = self.shared.index.get(cid).map_or(0.0, |r| r.heat);
                let free = self
                    .shared
                    .memory
                    .budget_bytes()
                    .saturating_sub(self.shared.memory.bytes_used());
                if heat::admit_to_memory(bytes.len() as u64, heat, free, &self.shared.config) {
                    let (admitted, _) = self.shared.memory.admit(cid, bytes.clone());
                    if admitted {
                        self.shared
                            .index
                            .update_if_present(cid, |r| r.in_memory = true);
                    }
                }

                Ok(bytes)
            }
            Err(crate::Error::Corrupted { .. }) => {
                self.shared.metrics.record_disk_error();
                self.shared
                    .index
                    .update_if_present(cid, |r| r.on_disk = false);
                self.fetch(cid, deadline, now)
            }
            Err(crate::Error::NotFound) => self.fetch(cid, deadline, now),
            Err(other) => Err(other),
        }
    }

    fn fetch(&self, cid: &Cid, deadline: Option<Duration>, now: u64) -> crate::Result<Arc<[u8]>> {
        self.shared.metrics.record_miss();

        match self.shared.in_flight.register(cid) {
            Lease::Follower(slot) => InFlightTable::wait(&slot),
            Lease::Leader => {
                let effective_deadline = deadline.or(Some(self.shared.config.fetch_deadline));
                let result = self.shared.store.fetch(cid, effective_deadline);

                let outcome = match result {
                    Ok(bytes) => {
                        let bytes: Arc<[u8]> = Arc::from(bytes);
                        self.shared.metrics.record_fetch(bytes.len() as u64);
                        self.admit_fresh(cid, bytes.clone(), now);
                        Ok(bytes)
                    }
                    Err(err) => {
                        self.shared.metrics.record_fetch_error();
                        Err(err)
                    }
                };

                self.shared.in_flight.publish(cid, outcome.clone());
                outcome
            }
        }
    }

    /// Admits a freshly fetched object to whichever tiers policy allows and
    /// creates/updates its metadata record.
    fn admit_fresh(&self, cid: &Cid, bytes: Arc<[u8]>, now: u64) {
        let size = bytes.len() as u64;
        let checksum = Checksum::digest(&bytes);

        let mut in_memory = false;
        let mut on_disk = false;

        let free = self
            .shared
            .memory
            .budget_bytes()
            .saturating_sub(self.shared.memory.bytes_used());
        if heat::admit_to_memory(size, 0.0, free, &self.shared.config) {
            let (admitted, _) = self.shared.memory.admit(cid, bytes.clone());
            in_memory = admitted;
        }

        if heat::admit_to_disk(size, &self.shared.config) {
            match self.shared.disk.put(cid, &bytes) {
                Ok(_) => on_disk = true,
                Err(crate::Error::OverBudget) => {
                    self.make_disk_room(size);
                    match self.shared.disk.put(cid, &bytes) {
                        Ok(_) => on_disk = true,
                        Err(_) => self.shared.metrics.record_disk_error(),
                    }
                }
                Err(_) => self.shared.metrics.record_disk_error(),
            }
        }

        self.shared.index.put_or_update(
            cid,
            || MetadataRecord::new(cid.clone(), size, checksum, now),
            |record| {
                record.size_bytes = size;
                record.checksum = checksum;
                record.in_memory = record.in_memory || in_memory;
                record.on_disk = record.on_disk || on_disk;
            },
        );
        // The fetch that populated this record counts as its first access.
        self.shared.index.mark_access(cid, now, &self.shared.config);

        self.refresh_gauges();
    }

    /// Evicts disk-resident, unpinned objects coldest-first until `needed`
    /// additional bytes would fit within budget.
    fn make_disk_room(&self, needed: u64) {
        let budget = self.shared.disk.budget_bytes();
        let mut candidates: Vec<MetadataRecord> =
            self.shared.index.scan(|r| r.on_disk && !r.pinned);
        candidates.sort_by(|a, b| {
            a.heat
                .partial_cmp(&b.heat)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.last_accessed.cmp(&b.last_accessed))
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.cid.cmp(&b.cid))
        });

        for record in candidates {
            if self.shared.disk.total_bytes() + needed <= budget {
                break;
            }
            self.shared.disk.remove(&record.cid);
            self.shared
                .index
                .update_if_present(&record.cid, |r| r.on_disk = false);
            self.shared.metrics.record_disk_eviction();
        }
    }

    /// Pins `cid`, fetching it if it is not already resident on any tier.
    ///
    /// # Errors
    ///
    /// Propagates any error from an implicit fetch.
    pub fn pin(&self, cid: &Cid) -> crate::Result<()> {
        if !self.shared.memory.contains(cid) && !self.shared.disk.has(cid) {
            self.get(cid)?;
        }

        self.shared.index.update_if_present(cid, |r| r.pinned = true);
        if self.shared.memory.contains(cid) {
            self.shared.memory.set_pinned(cid, true);
        }

        Ok(())
    }

    /// Clears a previously set pin. Does not evict.
    pub fn unpin(&self, cid: &Cid) {
        self.shared.index.update_if_present(cid, |r| r.pinned = false);
        if self.shared.memory.contains(cid) {
            self.shared.memory.set_pinned(cid, false);
        }
    }

    /// Removes `cid` from both tiers. The metadata record survives with its
    /// tier flags cleared; a subsequent `get` always triggers a fetch.
    pub fn invalidate(&self, cid: &Cid) {
        self.shared.memory.remove(cid);
        self.shared.disk.remove(cid);
        self.shared.index.update_if_present(cid, |r| {
            r.in_memory = false;
            r.on_disk = false;
        });
        self.refresh_gauges();
    }

    /// A point-in-time snapshot of cache counters and gauges.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.refresh_gauges();
        self.shared.metrics.snapshot()
    }

    fn refresh_gauges(&self) {
        self.shared
            .metrics
            .set_mem_bytes_used(self.shared.memory.bytes_used());
        self.shared
            .metrics
            .set_disk_bytes_used(self.shared.disk.total_bytes());
    }

    /// Runs one compactor pass synchronously: recomputes heat for stale
    /// entries, demotes cold memory entries to disk-only, evicts coldest
    /// disk entries over budget, and flushes the metadata index.
    ///
    /// Exposed directly (rather than only via the background thread) so
    /// callers and tests can force a deterministic compaction point instead
    /// of waiting on `compactor_interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the metadata index fails.
    pub fn run_compaction_pass(&self) -> crate::Result<()> {
        run_compaction_pass(&self.shared)
    }

    /// Stops the background compactor thread and flushes the metadata
    /// index one last time.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> crate::Result<()> {
        self.stop.send();
        if let Some(handle) = self.worker.lock().expect("lock poisoned").take() {
            let _ = handle.join();
        }
        self.shared.index.flush().inspect_err(|_| self.shared.metrics.record_index_error())
    }
}

impl<S: ObjectStore + 'static, C: Clock + 'static> Drop for TieredCache<S, C> {
    fn drop(&mut self) {
        self.stop.send();
        if let Some(handle) = self.worker.lock().expect("lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

fn spawn_compactor<S: ObjectStore + 'static, C: Clock + 'static>(
    shared: Arc<Shared<S, C>>,
    stop: StopSignal,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let step = Duration::from_millis(100);
        let mut since_flush = Duration::ZERO;
        let mut since_compaction = Duration::ZERO;

        while !stop.is_stopped() {
            std::thread::sleep(step);
            since_flush += step;
            since_compaction += step;

            if since_compaction >= shared.config.compactor_interval {
                since_compaction = Duration::ZERO;
                since_flush = Duration::ZERO;
                if let Err(err) = run_compaction_pass(&shared) {
                    log::warn!("compactor pass failed: {err}");
                }
            } else if since_flush >= shared.config.flush_interval {
                since_flush = Duration::ZERO;
                if let Err(err) = shared.index.flush() {
                    shared.metrics.record_index_error();
                    log::warn!("periodic index flush failed: {err}");
                }
            }
        }
    })
}

fn run_compaction_pass<S: ObjectStore, C: Clock>(shared: &Arc<Shared<S, C>>) -> crate::Result<()> {
    let now = shared.clock.now_ms();

    let all = shared.index.scan(|_| true);
    for record in &all {
        let recomputed = heat::heat(record, now, &shared.config);
        shared.index.update_if_present(&record.cid, |r| r.heat = recomputed);
    }

    let demotable = shared.index.scan(|r| {
        r.in_memory
            && !r.pinned
            && heat::demote_candidate(r.heat, now.saturating_sub(r.last_accessed), &shared.config)
    });
    for record in demotable {
        let Some(bytes) = shared.memory.take(&record.cid) else {
            continue;
        };

        let mut now_on_disk = record.on_disk;
        if !now_on_disk && heat::admit_to_disk(record.size_bytes, &shared.config) {
            now_on_disk = shared.disk.put(&record.cid, &bytes).is_ok();
        }

        shared.index.update_if_present(&record.cid, |r| {
            r.in_memory = false;
            r.on_disk = now_on_disk;
        });
        shared.metrics.record_mem_eviction();
    }

    if shared.disk.total_bytes() > shared.disk.budget_bytes() {
        let mut candidates: Vec<MetadataRecord> = shared.index.scan(|r| r.on_disk && !r.pinned);
        candidates.sort_by(|a, b| {
            a.heat
                .partial_cmp(&b.heat)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.last_accessed.cmp(&b.last_accessed))
                .then(b.size_bytes.cmp(&a.size_bytes))
                .then(a.cid.cmp(&b.cid))
        });

        for record in candidates {
            if shared.disk.total_bytes() <= shared.disk.budget_bytes() {
                break;
            }
            shared.disk.remove(&record.cid);
            shared.index.update_if_present(&record.cid, |r| r.on_disk = false);
            shared.metrics.record_disk_eviction();
        }
    }

    shared.metrics.set_mem_bytes_used(shared.memory.bytes_used());
    shared.metrics.set_disk_bytes_used(shared.disk.total_bytes());

    shared.index.flush().inspect_err(|_| shared.metrics.record_index_error())
}
