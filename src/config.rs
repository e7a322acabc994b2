// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Cache configuration.
//!
//! Every recognized option is an explicit field on [`CacheConfig`]; there is
//! no dynamic/attribute-based configuration surface and no implicit env or
//! file loading here (that belongs to the excluded outer configuration
//! layer). Unknown options simply do not exist as a concept: the only way to
//! build a [`CacheConfig`] is through [`CacheConfig::new`] followed by the
//! typed setters below.

use std::path::{Path, PathBuf};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Configuration for a [`crate::TieredCache`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Root directory for object files and the metadata index.
    pub(crate) disk_root_path: PathBuf,

    /// Byte budget for the in-memory ARC tier.
    pub(crate) memory_budget_bytes: u64,

    /// Soft byte budget for the on-disk tier.
    pub(crate) disk_budget_bytes: u64,

    /// Objects larger than this never enter the memory tier.
    pub(crate) memory_max_item_bytes: u64,

    /// Objects smaller than this never enter the disk tier.
    pub(crate) disk_min_item_bytes: u64,

    /// Objects larger than this are never cached in either tier.
    pub(crate) disk_max_item_bytes: u64,

    /// Half-life used by the recency component of the heat score.
    pub(crate) heat_half_life: Duration,

    /// Saturation point of the frequency component of the heat score.
    pub(crate) heat_freq_cap: u64,

    /// Weight given to recency vs. frequency in the heat score, in `[0, 1]`.
    pub(crate) heat_alpha: f32,

    /// Minimum heat for a disk-resident object to be promoted to memory.
    pub(crate) heat_admit_memory: f32,

    /// Heat below which a memory-resident object becomes a demotion candidate.
    pub(crate) heat_demote: f32,

    /// Minimum idle time before a cold entry may be demoted.
    pub(crate) idle_grace: Duration,

    /// Cadence at which the metadata index flushes dirty records to Parquet.
    pub(crate) flush_interval: Duration,

    /// Cadence of the background compactor pass.
    pub(crate) compactor_interval: Duration,

    /// Whether to re-verify object bytes against the CID after a fetch.
    pub(crate) verify_on_fetch: bool,

    /// Deadline applied to `ObjectStore::fetch` when the caller gives none.
    pub(crate) fetch_deadline: Duration,
}

impl CacheConfig {
    /// Creates a configuration with every documented default, rooted at `path`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            disk_root_path: path.as_ref().to_path_buf(),
            memory_budget_bytes: 100 * MIB,
            disk_budget_bytes: GIB,
            memory_max_item_bytes: 16 * MIB,
            disk_min_item_bytes: 0,
            disk_max_item_bytes: 512 * MIB,
            heat_half_life: Duration::from_secs(43_200),
            heat_freq_cap: 10,
            heat_alpha: 0.4,
            heat_admit_memory: 0.2,
            heat_demote: 0.1,
            idle_grace: Duration::from_secs(300),
            flush_interval: Duration::from_secs(60),
            compactor_interval: Duration::from_secs(30),
            verify_on_fetch: false,
            fetch_deadline: Duration::from_secs(30),
        }
    }

    /// Sets the byte budget for the in-memory ARC tier.
    ///
    /// A budget of `0` disables the memory tier entirely; every read is
    /// served from disk or the upstream object store.
    ///
    /// Defaults to 100 MiB.
    #[must_use]
    pub fn memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    /// Sets the soft byte budget for the on-disk tier.
    ///
    /// Defaults to 1 GiB.
    #[must_use]
    pub fn disk_budget_bytes(mut self, bytes: u64) -> Self {
        self.disk_budget_bytes = bytes;
        self
    }

    /// Sets the largest object size admitted into the memory tier.
    ///
    /// Defaults to 16 MiB.
    #[must_use]
    pub fn memory_max_item_bytes(mut self, bytes: u64) -> Self {
        self.memory_max_item_bytes = bytes;
        self
    }

    /// Sets the smallest object size admitted into the disk tier.
    ///
    /// Defaults to 0 (no lower bound).
    #[must_use]
    pub fn disk_min_item_bytes(mut self, bytes: u64) -> Self {
        self.disk_min_item_bytes = bytes;
        self
    }

    /// Sets the largest object size ever cached in either tier.
    ///
    /// Defaults to 512 MiB.
    ///
    /// # Panics
    ///
    /// Panics if smaller than `memory_max_item_bytes`.
    #[must_use]
    pub fn disk_max_item_bytes(mut self, bytes: u64) -> Self {
        assert!(
            bytes >= self.memory_max_item_bytes,
            "disk_max_item_bytes must be >= memory_max_item_bytes"
        );
        self.disk_max_item_bytes = bytes;
        self
    }

    /// Sets the half-life of the recency component of the heat score.
    ///
    /// Defaults to 12 hours.
    #[must_use]
    pub fn heat_half_life(mut self, half_life: Duration) -> Self {
        self.heat_half_life = half_life;
        self
    }

    /// Sets the access-count saturation point of the frequency component.
    ///
    /// Defaults to 10.
    #[must_use]
    pub fn heat_freq_cap(mut self, cap: u64) -> Self {
        self.heat_freq_cap = cap.max(1);
        self
    }

    /// Sets the recency/frequency blend weight.
    ///
    /// Defaults to 0.4.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is outside `[0.0, 1.0]`.
    #[must_use]
    pub fn heat_alpha(mut self, alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "alpha must be in [0, 1]");
        self.heat_alpha = alpha;
        self
    }

    /// Sets the heat threshold above which a disk-only object is promoted to memory.
    ///
    /// Defaults to 0.2.
    #[must_use]
    pub fn heat_admit_memory(mut self, threshold: f32) -> Self {
        self.heat_admit_memory = threshold;
        self
    }

    /// Sets the heat threshold below which a memory object becomes a demotion candidate.
    ///
    /// Defaults to 0.1.
    #[must_use]
    pub fn heat_demote(mut self, threshold: f32) -> Self {
        self.heat_demote = threshold;
        self
    }

    /// Sets the minimum idle time before a cold entry may be demoted.
    ///
    /// Defaults to 300 seconds.
    #[must_use]
    pub fn idle_grace(mut self, grace: Duration) -> Self {
        self.idle_grace = grace;
        self
    }

    /// Sets the metadata index flush cadence.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the background compactor cadence.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub fn compactor_interval(mut self, interval: Duration) -> Self {
        self.compactor_interval = interval;
        self
    }

    /// Enables re-verifying object bytes against the CID immediately after fetch.
    ///
    /// Defaults to `false` (the core trusts the `ObjectStore`).
    #[must_use]
    pub fn verify_on_fetch(mut self, verify: bool) -> Self {
        self.verify_on_fetch = verify;
        self
    }

    /// Sets the default fetch deadline used when a caller's `get` specifies none.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub fn fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = deadline;
        self
    }

    /// The configured root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.disk_root_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CacheConfig::new("/tmp/whatever");
        assert_eq!(cfg.memory_budget_bytes, 100 * MIB);
        assert_eq!(cfg.disk_budget_bytes, GIB);
        assert_eq!(cfg.memory_max_item_bytes, 16 * MIB);
        assert_eq!(cfg.disk_min_item_bytes, 0);
        assert_eq!(cfg.disk_max_item_bytes, 512 * MIB);
        assert_eq!(cfg.heat_half_life, Duration::from_secs(43_200));
        assert_eq!(cfg.heat_freq_cap, 10);
        assert!((cfg.heat_alpha - 0.4).abs() < f32::EPSILON);
        assert!((cfg.heat_admit_memory - 0.2).abs() < f32::EPSILON);
        assert!((cfg.heat_demote - 0.1).abs() < f32::EPSILON);
        assert_eq!(cfg.idle_grace, Duration::from_secs(300));
        assert_eq!(cfg.flush_interval, Duration::from_secs(60));
        assert_eq!(cfg.compactor_interval, Duration::from_secs(30));
        assert!(!cfg.verify_on_fetch);
        assert_eq!(cfg.fetch_deadline, Duration::from_secs(30));
    }

    #[test]
    fn builder_chain_overrides_defaults() {
        let cfg = CacheConfig::new("/tmp/whatever")
            .memory_budget_bytes(0)
            .disk_budget_bytes(10)
            .verify_on_fetch(true);

        assert_eq!(cfg.memory_budget_bytes, 0);
        assert_eq!(cfg.disk_budget_bytes, 10);
        assert!(cfg.verify_on_fetch);
    }

    #[test]
    #[should_panic(expected = "alpha must be in")]
    fn rejects_invalid_alpha() {
        CacheConfig::new("/tmp/whatever").heat_alpha(1.5);
    }
}
