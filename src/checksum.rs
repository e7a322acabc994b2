// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fast, non-cryptographic checksums for disk objects.
//!
//! CIDs are assumed to already be collision-resistant content identifiers
//! (verified, if at all, by the external `ObjectStore`); this checksum only
//! guards against local bit rot / truncated writes, not malicious tampering.

/// A 128-bit checksum
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Checksum(u128);

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Checksum {
    /// Wraps a raw checksum value
    #[must_use]
    pub fn from_raw(value: u128) -> Self {
        Self(value)
    }

    /// Returns the raw 128-bit integer
    #[must_use]
    pub fn into_u128(self) -> u128 {
        self.0
    }

    /// Computes the checksum of a byte slice
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = xxhash_rust::xxh3::Xxh3::default();
        hasher.update(bytes);
        Self(hasher.digest128())
    }

    /// Returns `Ok(())` if `self` matches `expected`, otherwise a [`crate::Error::Corrupted`]
    pub(crate) fn check(&self, expected: Self) -> crate::Result<()> {
        if self.0 == expected.0 {
            Ok(())
        } else {
            Err(crate::Error::Corrupted {
                expected,
                got: *self,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = Checksum::digest(b"hello world");
        let b = Checksum::digest(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_detects_tamper() {
        let a = Checksum::digest(b"hello world");
        let b = Checksum::digest(b"hello worle");
        assert_ne!(a, b);
        assert!(a.check(b).is_err());
    }

    #[test]
    fn display_is_hex() {
        let c = Checksum::from_raw(0xdead_beef);
        assert_eq!(format!("{c}"), format!("{:032x}", 0xdead_beef_u128));
    }
}
