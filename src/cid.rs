// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Content identifiers: opaque, immutable keys for content-addressed bytes.

use std::sync::Arc;

/// A content identifier.
///
/// `Cid` is cheap to clone (an `Arc`-backed byte string) and hashes/compares
/// on its binary form only; the core never interprets the bytes further,
/// that is the responsibility of the `ObjectStore`/daemon this crate does
/// not implement.
#[derive(Clone, Eq)]
pub struct Cid {
    raw: Arc<[u8]>,
    text: Arc<str>,
}

impl Cid {
    /// Parses a CID from its canonical string form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCid`] if `s` is empty.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidCid("empty CID string".into()));
        }

        Ok(Self {
            raw: Arc::from(s.as_bytes()),
            text: Arc::from(s),
        })
    }

    /// Builds a CID directly from raw bytes, using their lossy UTF-8
    /// rendering as the canonical string form.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        let raw: Arc<[u8]> = bytes.into();
        let text: Arc<str> = Arc::from(String::from_utf8_lossy(&raw).into_owned());
        Self { raw, text }
    }

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The binary form.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Two-character shard prefixes used to lay the CID out on disk, see
    /// [`crate::DiskTier`].
    ///
    /// Short CIDs are padded with `'_'` so every object still gets a
    /// two-level directory, even in tests that use single-character CIDs.
    #[must_use]
    pub(crate) fn shard_prefixes(&self) -> (String, String) {
        let mut chars = self.text.chars();
        let a1 = chars.next().unwrap_or('_');
        let a2 = chars.next().unwrap_or('_');
        let b1 = chars.next().unwrap_or('_');
        let b2 = chars.next().unwrap_or('_');
        (
            [a1, a2].iter().collect(),
            [b1, b2].iter().collect(),
        )
    }
}

impl std::fmt::Debug for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cid({})", self.text)
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl PartialEq for Cid {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl std::hash::Hash for Cid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Cid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        #[expect(clippy::expect_used, reason = "non-empty literal CIDs used pervasively in tests")]
        Self::parse(value).expect("valid CID")
    }
}

impl From<String> for Cid {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}
