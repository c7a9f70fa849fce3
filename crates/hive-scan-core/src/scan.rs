//! Reader pipeline for Hive table scans.
//!
//! Given a table, a sub-scan and an operator context, the pipeline turns
//! every split into exactly one [`crate::reader::RecordReader`]:
//!
//! - [`HiveScanner`] owns the strategy resolver, the constructor table and
//!   the SerDe and delta collaborators;
//! - [`ReaderFactory`] binds them to one sub-scan and builds (or just plans)
//!   the reader of a single split;
//! - [`ScanReaders`] is the lazy, ordered sequence of readers and owns their
//!   release.
//!
//! Errors are reported through [`ScanError`], which always names the split
//! that failed.
mod context;
mod error;
mod factory;
mod readers;
#[cfg(test)]
pub(crate) mod test_util;

pub use context::{
    CurrentIdentity, HiveSubScan, Identity, IdentityScope, OperatorContext, ResourceAllocator,
    ScanFilter, ScopedWork,
};
pub use error::{ConstructionError, ResourceError, ScanError, SplitError, SplitResult};
pub use factory::{HiveScanner, ReaderFactory, SplitPlan};
pub use readers::{EMPTY_SCAN_SPLIT_KEY, ManagedReader, ScanReaders};
