// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Reference-counted memory-mapped object reads with deferred unlink.

use memmap2::Mmap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(super) struct MappedObject {
    pub(super) path: PathBuf,
    pub(super) mmap: Mmap,
    pub(super) payload_offset: usize,
    /// Set by `DiskTier::remove` when a live mapping exists; the backing
    /// file is unlinked in `Drop`, once the last `Arc` goes away.
    pub(super) unlink_on_drop: AtomicBool,
}

impl Drop for MappedObject {
    fn drop(&mut self) {
        if self.unlink_on_drop.load(Ordering::Acquire) {
            if let Err(err) = std::fs::remove_file(&self.path) {
                log::warn!("failed to unlink deferred object {:?}: {err}", self.path);
            }
        }
    }
}

/// A zero-copy, read-only view of an object's bytes, memory-mapped from its
/// on-disk file. Cheap to clone; the backing file stays open and mapped for
/// as long as any clone is alive.
#[derive(Clone)]
pub struct MappedRegion(pub(super) Arc<MappedObject>);

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0.mmap[self.0.payload_offset..]
    }
}

impl AsRef<[u8]> for MappedRegion {
    fn as_ref(&self) -> &[u8] {
        self
    }
}
