// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Checksum, Cid};

/// A single row of the metadata index: everything known about one CID.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataRecord {
    /// The CID this record describes.
    pub cid: Cid,
    /// Size of the object in bytes.
    pub size_bytes: u64,
    /// Optional MIME type, if ever supplied by a caller.
    pub mime: Option<String>,
    /// When this record was first created, ms since epoch.
    pub added_at: u64,
    /// Most recent access time, ms since epoch.
    pub last_accessed: u64,
    /// Number of times this CID has been accessed.
    pub access_count: u64,
    /// Cached heat score, recomputed on access and by the compactor.
    pub heat: f32,
    /// Whether this CID is exempt from eviction.
    pub pinned: bool,
    /// Whether the object is currently resident in the memory tier.
    pub in_memory: bool,
    /// Whether the object is currently resident in the disk tier.
    pub on_disk: bool,
    /// Digest of the object bytes, for corruption detection.
    pub checksum: Checksum,
}

impl MetadataRecord {
    /// Creates a fresh record for a CID observed for the first time.
    #[must_use]
    pub fn new(cid: Cid, size_bytes: u64, checksum: Checksum, now_ms: u64) -> Self {
        Self {
            cid,
            size_bytes,
            mime: None,
            added_at: now_ms,
            last_accessed: now_ms,
            access_count: 0,
            heat: 0.0,
            pinned: false,
            in_memory: false,
            on_disk: false,
            checksum,
        }
    }
}
