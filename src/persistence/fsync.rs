//! Durability helpers for persisted-state writes.
//!
//! Both the state file and its parent directory must be fsynced for a
//! rename-based atomic write to survive a crash.

use std::fs::File;
use std::io;
use std::path::Path;

/// Flushes a file's contents to stable storage.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Flushes a directory, making a completed rename durable.
///
/// On platforms where directories cannot be opened for sync (e.g. Windows),
/// this is a no-op.
pub fn fsync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)?;
        dir.sync_all()
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
