// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Checksum;

/// Represents errors that can occur while operating the tiered cache
#[derive(Debug)]
pub enum Error {
    /// CID absent locally and the object store reports it does not exist
    NotFound,

    /// I/O error from the filesystem or the object store
    Io(std::io::Error),

    /// Checksum mismatch on a disk object; the offending file has already
    /// been removed before this error is returned
    Corrupted {
        /// Checksum actually read from disk
        got: Checksum,
        /// Checksum recorded in the metadata index
        expected: Checksum,
    },

    /// A fetch deadline was exceeded
    Timeout,

    /// Admission failed because eviction could not free enough space and no
    /// object qualified for eviction (e.g. everything resident is pinned)
    OverBudget,

    /// A CID string could not be parsed
    InvalidCid(String),

    /// The columnar metadata index failed to encode or decode a batch
    Index(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "object not found"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Corrupted { got, expected } => {
                write!(f, "checksum mismatch: got {got}, expected {expected}")
            }
            Self::Timeout => write!(f, "fetch deadline exceeded"),
            Self::OverBudget => write!(f, "admission would exceed budget and nothing evictable"),
            Self::InvalidCid(s) => write!(f, "invalid CID: {s}"),
            Self::Index(msg) => write!(f, "metadata index error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Clone for Error {
    /// `std::io::Error` isn't `Clone`; an IO error is reconstructed from its
    /// kind and message. This loses the original's `source()` chain, which
    /// is an acceptable trade-off since the only caller is the in-flight
    /// fetch table broadcasting one upstream error to N waiters.
    fn clone(&self) -> Self {
        match self {
            Self::NotFound => Self::NotFound,
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Corrupted { got, expected } => Self::Corrupted {
                got: *got,
                expected: *expected,
            },
            Self::Timeout => Self::Timeout,
            Self::OverBudget => Self::OverBudget,
            Self::InvalidCid(s) => Self::InvalidCid(s.clone()),
            Self::Index(s) => Self::Index(s.clone()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<parquet::errors::ParquetError> for Error {
    fn from(value: parquet::errors::ParquetError) -> Self {
        Self::Index(value.to_string())
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(value: arrow_schema::ArrowError) -> Self {
        Self::Index(value.to_string())
    }
}

/// Cache result
pub type Result<T> = std::result::Result<T, Error>;
