// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Encoding `MetadataRecord` rows to/from Arrow `RecordBatch`es and Parquet
//! files on disk.

use super::record::MetadataRecord;
use super::schema::schema;
use crate::Checksum;
use crate::Cid;
use arrow_array::{
    Array, BooleanArray, Float32Array, Int64Array, RecordBatch, StringArray, UInt64Array,
};
use arrow_array::array::BinaryArray;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Encodes a batch of records into a columnar `RecordBatch`.
///
/// # Errors
///
/// Returns an error if Arrow rejects the constructed columns (only possible
/// on a length mismatch, which cannot happen here).
pub fn encode(records: &[MetadataRecord]) -> crate::Result<RecordBatch> {
    let cid = BinaryArray::from_iter_values(records.iter().map(|r| r.cid.as_bytes()));
    let size_bytes = UInt64Array::from_iter_values(records.iter().map(|r| r.size_bytes));
    let mime = StringArray::from_iter(records.iter().map(|r| r.mime.as_deref()));
    #[expect(clippy::cast_possible_wrap, reason = "ms-since-epoch timestamps fit in i64 until year 292277026596")]
    let added_at = Int64Array::from_iter_values(records.iter().map(|r| r.added_at as i64));
    #[expect(clippy::cast_possible_wrap, reason = "ms-since-epoch timestamps fit in i64 until year 292277026596")]
    let last_accessed = Int64Array::from_iter_values(records.iter().map(|r| r.last_accessed as i64));
    let access_count = UInt64Array::from_iter_values(records.iter().map(|r| r.access_count));
    let heat = Float32Array::from_iter_values(records.iter().map(|r| r.heat));
    let pinned = BooleanArray::from_iter(records.iter().map(|r| Some(r.pinned)));
    let in_memory = BooleanArray::from_iter(records.iter().map(|r| Some(r.in_memory)));
    let on_disk = BooleanArray::from_iter(records.iter().map(|r| Some(r.on_disk)));
    let checksum =
        BinaryArray::from_iter_values(records.iter().map(|r| r.checksum.into_u128().to_le_bytes()));

    let batch = RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(cid) as Arc<dyn Array>,
            Arc::new(size_bytes),
            Arc::new(mime),
            Arc::new(added_at),
            Arc::new(last_accessed),
            Arc::new(access_count),
            Arc::new(heat),
            Arc::new(pinned),
            Arc::new(in_memory),
            Arc::new(on_disk),
            Arc::new(checksum),
        ],
    )?;

    Ok(batch)
}

/// Decodes a `RecordBatch` (in the canonical schema) back into rows.
///
/// # Errors
///
/// Returns [`crate::Error::Index`] if a column is missing or has an
/// unexpected physical type.
pub fn decode(batch: &RecordBatch) -> crate::Result<Vec<MetadataRecord>> {
    let column = |name: &str| -> crate::Result<&Arc<dyn Array>> {
        batch
            .column_by_name(name)
            .ok_or_else(|| crate::Error::Index(format!("missing column {name}")))
    };

    let cid = column("cid")?
        .as_any()
        .downcast_ref::<BinaryArray>()
        .ok_or_else(|| crate::Error::Index("cid column has wrong type".into()))?;
    let size_bytes = column("size_bytes")?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| crate::Error::Index("size_bytes column has wrong type".into()))?;
    let mime = column("mime")?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| crate::Error::Index("mime column has wrong type".into()))?;
    let added_at = column("added_at")?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| crate::Error::Index("added_at column has wrong type".into()))?;
    let last_accessed = column("last_accessed")?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| crate::Error::Index("last_accessed column has wrong type".into()))?;
    let access_count = column("access_count")?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| crate::Error::Index("access_count column has wrong type".into()))?;
    let heat = column("heat")?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| crate::Error::Index("heat column has wrong type".into()))?;
    let pinned = column("pinned")?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| crate::Error::Index("pinned column has wrong type".into()))?;
    let in_memory = column("in_memory")?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| crate::Error::Index("in_memory column has wrong type".into()))?;
    let on_disk = column("on_disk")?
        .as_any()
        .downcast_ref::<BooleanArray>()
        .ok_or_else(|| crate::Error::Index("on_disk column has wrong type".into()))?;
    let checksum = column("checksum")?
        .as_any()
        .downcast_ref::<BinaryArray>()
        .ok_or_else(|| crate::Error::Index("checksum column has wrong type".into()))?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let raw_checksum = checksum.value(i);
        let mut buf = [0u8; 16];
        if raw_checksum.len() != 16 {
            return Err(crate::Error::Index("checksum column has wrong width".into()));
        }
        buf.copy_from_slice(raw_checksum);

        rows.push(MetadataRecord {
            cid: Cid::from_bytes(cid.value(i).to_vec()),
            size_bytes: size_bytes.value(i),
            mime: mime.is_valid(i).then(|| mime.value(i).to_string()),
            #[expect(clippy::cast_sign_loss, reason = "timestamps are always non-negative")]
            added_at: added_at.value(i) as u64,
            #[expect(clippy::cast_sign_loss, reason = "timestamps are always non-negative")]
            last_accessed: last_accessed.value(i) as u64,
            access_count: access_count.value(i),
            heat: heat.value(i),
            pinned: pinned.value(i),
            in_memory: in_memory.value(i),
            on_disk: on_disk.value(i),
            checksum: Checksum::from_raw(u128::from_le_bytes(buf)),
        });
    }

    Ok(rows)
}

/// Writes `records` as a new, self-contained Parquet partition at `path`.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] or [`crate::Error::Index`] on write failure.
pub fn write_partition(path: &Path, records: &[MetadataRecord]) -> crate::Result<()> {
    let batch = encode(records)?;
    let file = File::create(path)?;
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Reads every record batch out of the Parquet partition at `path`.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] or [`crate::Error::Index`] if the file is
/// missing or unreadable; callers are expected to treat this as "skip and
/// warn" per spec §4.2, not as a fatal start-up error.
pub fn read_partition(path: &Path) -> crate::Result<Vec<MetadataRecord>> {
    let file = File::open(path)?;
    let builder = parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| crate::Error::Index(e.to_string()))?;
        rows.extend(decode(&batch)?);
    }

    Ok(rows)
}
