// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Pure, deterministic functions that score "heat" and decide tier admission.
//!
//! Everything here is a function of a [`crate::MetadataRecord`] and the
//! current time; none of it touches locks, files, or the network, which
//! keeps it trivially unit-testable and safe to call from any tier.

use crate::config::CacheConfig;
use crate::metadata_index::MetadataRecord;

/// Computes `heat(record, now) = alpha * recency + (1 - alpha) * frequency`.
#[must_use]
pub fn heat(record: &MetadataRecord, now_ms: u64, cfg: &CacheConfig) -> f32 {
    let age_ms = now_ms.saturating_sub(record.last_accessed);
    let r = recency(age_ms, cfg.heat_half_life.as_millis().max(1) as u64);
    let f = frequency(record.access_count, cfg.heat_freq_cap);
    cfg.heat_alpha * r + (1.0 - cfg.heat_alpha) * f
}

/// Exponential recency decay: `2^(-age / half_life)`.
#[must_use]
pub fn recency(age_ms: u64, half_life_ms: u64) -> f32 {
    let half_life_ms = half_life_ms.max(1) as f64;
    let exponent = -(age_ms as f64) / half_life_ms;
    2f64.powf(exponent) as f32
}

/// Saturating frequency score: `min(n, cap) / cap`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn frequency(access_count: u64, cap: u64) -> f32 {
    let cap = cap.max(1);
    (access_count.min(cap) as f64 / cap as f64) as f32
}

/// Whether an object of `size` bytes and score `heat` should be admitted to
/// the memory tier, given the tier currently has `free_bytes` available.
#[must_use]
pub fn admit_to_memory(size: u64, heat: f32, free_bytes: u64, cfg: &CacheConfig) -> bool {
    size <= cfg.memory_max_item_bytes && (heat >= cfg.heat_admit_memory || free_bytes >= size)
}

/// Whether an object of `size` bytes should be admitted to the disk tier.
#[must_use]
pub fn admit_to_disk(size: u64, cfg: &CacheConfig) -> bool {
    size >= cfg.disk_min_item_bytes && size <= cfg.disk_max_item_bytes
}

/// Whether a memory-resident object is a demotion candidate: cold and idle
/// for at least `idle_grace`.
#[must_use]
pub fn demote_candidate(heat: f32, idle_ms: u64, cfg: &CacheConfig) -> bool {
    heat < cfg.heat_demote && idle_ms >= cfg.idle_grace.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg() -> CacheConfig {
        CacheConfig::new("/tmp/heat-test")
    }

    #[test]
    fn recency_at_zero_age_is_one() {
        assert!((recency(0, 1_000) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn recency_halves_at_half_life() {
        let r = recency(1_000, 1_000);
        assert!((r - 0.5).abs() < 1e-3);
    }

    #[test]
    fn frequency_saturates_at_cap() {
        assert!((frequency(100, 10) - 1.0).abs() < 1e-6);
        assert!((frequency(5, 10) - 0.5).abs() < 1e-6);
        assert!((frequency(0, 10) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn admit_to_memory_respects_size_cap() {
        let cfg = cfg();
        assert!(!admit_to_memory(cfg.memory_max_item_bytes + 1, 1.0, u64::MAX, &cfg));
    }

    #[test]
    fn admit_to_memory_allows_hot_or_free_budget() {
        let cfg = cfg().heat_admit_memory(0.5);
        assert!(admit_to_memory(10, 0.6, 0, &cfg));
        assert!(admit_to_memory(10, 0.0, 100, &cfg));
        assert!(!admit_to_memory(10, 0.0, 0, &cfg));
    }

    #[test]
    fn admit_to_disk_respects_bounds() {
        let cfg = cfg().disk_min_item_bytes(10).disk_max_item_bytes(100);
        assert!(!admit_to_disk(5, &cfg));
        assert!(admit_to_disk(50, &cfg));
        assert!(!admit_to_disk(200, &cfg));
    }

    #[test]
    fn demote_candidate_requires_both_cold_and_idle() {
        let cfg = cfg().heat_demote(0.2).idle_grace(Duration::from_secs(10));
        assert!(!demote_candidate(0.5, 20_000, &cfg));
        assert!(!demote_candidate(0.1, 5_000, &cfg));
        assert!(demote_candidate(0.1, 20_000, &cfg));
    }
}
