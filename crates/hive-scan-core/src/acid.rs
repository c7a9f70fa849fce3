//! Transactional (ACID) delta inspection.
//!
//! A transactional split may have unmerged delta directories next to its
//! base data. When it does, the split must be read by a merge-capable reader,
//! so the pipeline asks this module once per split whether deltas are
//! pending.
//!
//! ## Directory layout (high level)
//!
//! ```text
//! t/part=1/                        # transactional root
//!   base_0000005/000000_0          # base, transactional layout (root = grandparent)
//!   delta_0000006_0000006/         # pending delta
//!   delta_0000007_0000007_0001/    # pending delta, statement 1
//! t/part=2/
//!   000000_0                       # base, original layout (root = parent)
//! ```
//!
//! Paths are handled as `/`-separated strings because split paths are
//! storage URIs (`hdfs://...`, `s3a://...`), not local paths.

use std::{fmt, path::Path};

use snafu::prelude::*;

use crate::{
    metadata::AcidSplit,
    storage::{self, StorageError},
};

/// Name prefix of insert/update delta directories.
pub const DELTA_PREFIX: &str = "delta_";

/// Name prefix of delete delta directories.
pub const DELETE_DELTA_PREFIX: &str = "delete_delta_";

/// Failure while listing a transactional root.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeltaError {
    /// Listing the root directory failed.
    #[snafu(display("Failed to list delta directories under {root}: {source}"))]
    ListRoot {
        /// Transactional root that was being listed.
        root: String,
        /// Underlying storage error.
        #[snafu(source, backtrace)]
        source: StorageError,
    },
}

fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

fn join(root: &str, child: &str) -> String {
    if root.ends_with('/') {
        format!("{root}{child}")
    } else {
        format!("{root}/{child}")
    }
}

/// Transactional root directory of a split.
///
/// - base in the original layout: the root is the base file's parent;
/// - base in the transactional layout (`base_N/<file>`): the root is the
///   base file's grandparent;
/// - no base: the split path already is the root.
pub fn transactional_root(path: &str, has_base: bool, is_original: bool) -> String {
    match (has_base, is_original) {
        (true, true) => parent(path).to_string(),
        (true, false) => parent(parent(path)).to_string(),
        (false, _) => path.to_string(),
    }
}

/// Directory name of a delta: `delta_<min:07>_<max:07>[_<stmt:04>]`.
pub fn delta_subdir(min_write_id: u64, max_write_id: u64, statement_id: Option<u32>) -> String {
    match statement_id {
        Some(stmt) => format!("{DELTA_PREFIX}{min_write_id:07}_{max_write_id:07}_{stmt:04}"),
        None => format!("{DELTA_PREFIX}{min_write_id:07}_{max_write_id:07}"),
    }
}

/// Source of the delta directories that exist under a transactional root.
pub trait DeltaLister: Send + Sync + fmt::Debug {
    /// Full paths of the delta directories under `root` relevant to `split`.
    fn list_deltas(&self, root: &str, split: &AcidSplit) -> Result<Vec<String>, DeltaError>;
}

/// Expands the delta metadata recorded on the split at planning time.
///
/// No storage access is performed.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordedDeltas;

impl DeltaLister for RecordedDeltas {
    fn list_deltas(&self, root: &str, split: &AcidSplit) -> Result<Vec<String>, DeltaError> {
        let mut out = Vec::new();
        for delta in &split.deltas {
            if delta.statement_ids.is_empty() {
                out.push(join(
                    root,
                    &delta_subdir(delta.min_write_id, delta.max_write_id, None),
                ));
            } else {
                for stmt in &delta.statement_ids {
                    out.push(join(
                        root,
                        &delta_subdir(delta.min_write_id, delta.max_write_id, Some(*stmt)),
                    ));
                }
            }
        }
        Ok(out)
    }
}

/// Lists `delta_*` and `delete_delta_*` directories on the local filesystem.
///
/// A root that does not exist has no deltas.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalDeltaLister;

impl DeltaLister for LocalDeltaLister {
    fn list_deltas(&self, root: &str, _split: &AcidSplit) -> Result<Vec<String>, DeltaError> {
        let names = match storage::list_subdirectories(Path::new(root)) {
            Ok(names) => names,
            Err(StorageError::NotFound { .. }) => return Ok(Vec::new()),
            Err(source) => {
                return Err(source).context(ListRootSnafu {
                    root: root.to_string(),
                });
            }
        };

        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(DELTA_PREFIX) || name.starts_with(DELETE_DELTA_PREFIX))
            .map(|name| join(root, &name))
            .collect())
    }
}

/// Whether `split` has at least one pending delta directory.
pub fn has_pending_deltas(split: &AcidSplit, lister: &dyn DeltaLister) -> Result<bool, DeltaError> {
    let root = transactional_root(&split.path, split.has_base, split.is_original);
    let deltas = lister.list_deltas(&root, split)?;
    Ok(!deltas.is_empty())
}
