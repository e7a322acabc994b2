// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The canonical Arrow/Parquet schema for metadata partitions. Column order
//! here is the on-disk contract; changing it is a schema-version bump, not a
//! free refactor.

use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Builds the canonical schema, shared by every partition this crate writes
/// or reads.
#[must_use]
pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("cid", DataType::Binary, false),
        Field::new("size_bytes", DataType::UInt64, false),
        Field::new("mime", DataType::Utf8, true),
        Field::new("added_at", DataType::Int64, false),
        Field::new("last_accessed", DataType::Int64, false),
        Field::new("access_count", DataType::UInt64, false),
        Field::new("heat", DataType::Float32, false),
        Field::new("pinned", DataType::Boolean, false),
        Field::new("in_memory", DataType::Boolean, false),
        Field::new("on_disk", DataType::Boolean, false),
        Field::new("checksum", DataType::Binary, false),
    ]))
}
