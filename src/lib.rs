// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A tiered, adaptive cache for content-addressed objects.
//!
//! ##### About
//!
//! `tiered-cache` sits in front of a content-addressed object store (an IPFS
//! node, a CAS daemon, anything keyed by a [`Cid`]) and serves reads out of
//! two local tiers before ever calling out to it:
//!
//! - an in-memory [Adaptive Replacement Cache](arc_cache) bounded by a byte
//!   budget, which adapts its recency/frequency balance to the workload
//!   instead of needing that balance tuned by hand;
//! - a content-addressed on-disk object store, read back zero-copy via
//!   `memmap2`.
//!
//! A columnar [`MetadataIndex`] tracks size, heat, pin state, and tier
//! residency for every CID the cache has ever seen, durable as incremental
//! Parquet partitions so the table survives a restart without replaying
//! every object.
//!
//! This crate never implements an [`ObjectStore`] itself, nor does it
//! transport, discover, or cryptographically verify CIDs against their
//! bytes; those are the responsibility of the daemon/network this cache sits
//! in front of.
//!
//! # Example usage
//!
//! ```
//! use tiered_cache::{CacheConfig, Cid, Error, ObjectStore, TieredCache};
//! use std::time::Duration;
//!
//! struct EchoStore;
//!
//! impl ObjectStore for EchoStore {
//!     fn fetch(&self, cid: &Cid, _deadline: Option<Duration>) -> tiered_cache::Result<Vec<u8>> {
//!         Ok(cid.as_bytes().to_vec())
//!     }
//! }
//!
//! # let folder = tempfile::tempdir()?;
//! let cache = TieredCache::open(CacheConfig::new(folder.path()), EchoStore)?;
//!
//! let cid = Cid::parse("hello")?;
//! let bytes = cache.get(&cid)?;
//! assert_eq!(&*bytes, b"hello");
//!
//! cache.pin(&cid)?;
//! cache.close()?;
//! #
//! # Ok::<(), Error>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![deny(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod arc_cache;
mod checksum;
mod cid;
mod config;
mod disk_tier;
mod error;
mod file;
mod heat;
mod metadata_index;
mod metrics;
mod object_store;

#[doc(hidden)]
pub mod stop_signal;

mod tiered_cache;
mod time;

pub use arc_cache::{ArcCache, ArcStats};
pub use checksum::Checksum;
pub use cid::Cid;
pub use config::CacheConfig;
pub use disk_tier::{DiskTier, MappedRegion};
pub use error::{Error, Result};
pub use heat::{admit_to_disk, admit_to_memory, demote_candidate, heat};
pub use metadata_index::{MetadataIndex, MetadataRecord};
pub use metrics::{Metrics, MetricsSnapshot};
pub use object_store::ObjectStore;
pub use tiered_cache::TieredCache;
pub use time::{Clock, ManualClock, SystemClock};
