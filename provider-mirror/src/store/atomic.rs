//! Atomic file publication.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};

/// Suffix of in-progress temp files.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// Sibling temp path used while `path` is being written.
///
/// The temp file is hidden (leading dot) so a half-written archive never
/// shows up under its final name.
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, TEMP_SUFFIX))
}

/// Whether a directory entry name looks like a leftover temp file.
pub(crate) fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Write `data` to `path` so readers observe either the old file or the
/// complete new one.
///
/// The bytes go to a sibling temp file which is flushed, fsynced and then
/// renamed over the destination. On failure the temp file is removed.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = temp_path_for(path);

    let result = write_synced(&temp_path, data).and_then(|()| fs::rename(&temp_path, path));

    result.map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::WriteFailed {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(data)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
