//! Local filesystem helpers.
//!
//! The scan core itself never reads data files; the only filesystem access
//! it performs is listing transactional delta directories when the
//! [`crate::acid::LocalDeltaLister`] is in use. That access is funnelled
//! through this module so path-carrying errors are built in one place.

use std::{fs, io, path::Path};

use snafu::{Backtrace, prelude::*};

/// Failure to list a local directory.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The directory does not exist.
    #[snafu(display("Directory not found: {path}"))]
    NotFound {
        /// The missing path.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// The path exists but is not a directory.
    #[snafu(display("Not a directory: {path}"))]
    NotADirectory {
        /// The offending path.
        path: String,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// Reading directory entries failed.
    #[snafu(display("Failed to read directory {path}: {source}"))]
    ReadDirectory {
        /// Directory (or entry) being read.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },
}

/// Result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Names of the directories directly under `dir`, sorted.
///
/// Semantics:
/// - On missing directory: `StorageError::NotFound`.
/// - When `dir` exists but is not a directory: `StorageError::NotADirectory`.
/// - On other I/O problems: `StorageError::ReadDirectory`.
///
/// Entries whose names are not valid UTF-8 are skipped.
pub fn list_subdirectories(dir: &Path) -> StorageResult<Vec<String>> {
    let path_str = dir.display().to_string();

    let meta = match fs::metadata(dir) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(e).context(NotFoundSnafu { path: path_str });
        }
        Err(e) => return Err(e).context(ReadDirectorySnafu { path: path_str }),
    };

    if !meta.is_dir() {
        return NotADirectorySnafu { path: path_str }.fail();
    }

    let entries = fs::read_dir(dir).context(ReadDirectorySnafu {
        path: path_str.clone(),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.context(ReadDirectorySnafu {
            path: path_str.clone(),
        })?;
        let file_type = entry.file_type().context(ReadDirectorySnafu {
            path: entry.path().display().to_string(),
        })?;
        if !file_type.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort_unstable();
    Ok(names)
}
