//! Size-rotated log file sink.
//!
//! Once the active file grows past the configured size it is renamed to
//! `<name>.1` (and gzipped when compression is on), older backups shift up by
//! one, and anything beyond the backup count is deleted.

use std::path::Path;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};

use crate::config::LogConfig;

const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    pub max_bytes: usize,
    pub max_backups: usize,
    pub compress: bool,
}

impl LogRotation {
    pub fn from_config(log: &LogConfig) -> Self {
        let max_mb = usize::try_from(log.max_size_mb.max(1)).unwrap_or(usize::MAX);
        Self {
            max_bytes: max_mb.saturating_mul(BYTES_PER_MB),
            max_backups: log.max_backups.max(1),
            compress: log.compress,
        }
    }
}

/// Opens `path` for appending, rotating it according to `rotation`.
///
/// The file is only cut after a write pushes it past `max_bytes`, so a log
/// line is never split across two files.
pub fn rotating_file(path: &Path, rotation: LogRotation) -> FileRotate<AppendCount> {
    let compression = if rotation.compress {
        Compression::OnRotate(0)
    } else {
        Compression::None
    };

    FileRotate::new(
        path,
        AppendCount::new(rotation.max_backups),
        ContentLimit::BytesSurpassed(rotation.max_bytes),
        compression,
        #[cfg(unix)]
        None,
    )
}
