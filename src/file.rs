// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Crash-safe file primitives shared by the disk tier and the metadata index.

use std::{fs::File, io::Write, path::Path};

pub const OBJECTS_FOLDER: &str = "objects";
pub const INDEX_FOLDER: &str = "index";
pub const MANIFEST_FILE: &str = "_manifest";

/// Atomically rewrites a file: write-temp-in-same-directory, fsync,
/// rename-into-place, then (on platforms that support it) fsync the parent
/// directory so the rename itself survives a crash.
pub fn rewrite_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    #[expect(
        clippy::expect_used,
        reason = "every file passed here has a parent directory"
    )]
    let folder = path.parent().expect("should have a parent");

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path)?;

    #[cfg(not(target_os = "windows"))]
    {
        let file = File::open(path)?;
        file.sync_all()?;
        fsync_directory(folder)?;
    }

    Ok(())
}

/// Fsyncs a directory so a preceding rename within it is crash-durable.
///
/// This spec requires it for `_manifest`; whether other callers need it is
/// filesystem-dependent (see DESIGN.md).
#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

/// No-op on Windows: directories cannot be fsynced there.
#[cfg(target_os = "windows")]
pub fn fsync_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_rewrite_replaces_contents() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("test.txt");

        {
            let mut file = File::create(&path)?;
            write!(file, "asdasdasdasdasd")?;
        }

        rewrite_atomic(&path, b"newcontent")?;

        let content = std::fs::read_to_string(&path)?;
        assert_eq!("newcontent", content);

        Ok(())
    }

    #[test]
    fn atomic_rewrite_creates_new_file() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fresh.txt");

        rewrite_atomic(&path, b"hello")?;

        assert_eq!(std::fs::read_to_string(&path)?, "hello");
        Ok(())
    }
}
