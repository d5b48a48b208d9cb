// sentinel-core/src/atomic.rs
// ============================================================================
// Module: Atomic File Persistence
// Description: Write-temp-fsync-rename helper shared by every persisted store.
// Purpose: Guarantee readers never observe a partially written file.
// Dependencies: std::fs, std::io
// ============================================================================

//! ## Overview
//! `spec.md` §6 requires every persisted file (`trust.json`, `facts.json`,
//! audit shards, the trace-analyzer state/report pair) to be written via
//! `<path>.<timestamp>.tmp` + fsync + rename. This is that one routine.

use std::fs;
use std::fs::File;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Writes `bytes` to `path` atomically: a sibling `<path>.<epoch-nanos>.tmp`
/// file is written and fsynced, then renamed over `path`.
///
/// # Errors
///
/// Returns the underlying [`io::Error`] from any filesystem step. On error
/// the temp file is left behind only if the rename itself failed after a
/// successful write (callers treat this as a persistence failure per
/// `spec.md` §7, not a fatal one).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos());
    let tmp_path = path.with_file_name(format!(
        "{}.{nanos}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state")
    ));
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Appends `line` (without trailing newline) followed by `\n` to `path`,
/// creating the file and parent directories if needed. Used by the audit
/// journal, which appends rather than rewriting its shard wholesale.
///
/// # Errors
///
/// Returns the underlying [`io::Error`] from any filesystem step.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
