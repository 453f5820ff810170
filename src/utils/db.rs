//! Read-only access to report databases
//! Reads go through a snapshot copy so a live writer never sees SQLITE_BUSY

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;

/// Copy a SQLite database, plus its WAL/SHM side files, into a temp file.
/// The snapshot is removed when the returned handle is dropped.
pub fn create_db_snapshot(source_path: &Path) -> Result<NamedTempFile> {
    if !source_path.exists() {
        anyhow::bail!("Database file does not exist: {:?}", source_path);
    }

    let temp_file = tempfile::Builder::new()
        .prefix("tzreport-snapshot-")
        .suffix(".db")
        .tempfile()?;

    fs::copy(source_path, temp_file.path())
        .with_context(|| format!("copying {:?} to snapshot", source_path))?;

    let source_str = source_path.to_string_lossy();
    let temp_str = temp_file.path().to_string_lossy();

    for side in ["-wal", "-shm"] {
        let side_path = format!("{}{}", source_str, side);
        if Path::new(&side_path).exists() {
            let _ = fs::copy(&side_path, format!("{}{}", temp_str, side));
        }
    }

    Ok(temp_file)
}

/// Run `f` against a read-only connection to a snapshot of `source_path`
pub fn with_db_snapshot<F, T>(source_path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let snapshot = create_db_snapshot(source_path)?;
    let conn = Connection::open_with_flags(snapshot.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("opening snapshot of {:?}", source_path))?;
    let result = f(&conn);
    drop(conn);
    result
}

/// Whether `table` exists in the connected database
pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
        [table],
        |row| row.get(0),
    )
    .unwrap_or(false)
}
