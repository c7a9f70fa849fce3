//! Operator context and sub-scan inputs.
use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    config::ScanOptions, metadata::DatasetSplit, reader::RecordReader, scan::error::SplitResult,
};

/// User a scan runs as.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// User name.
    pub user: String,
}

impl Identity {
    /// Identity for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Identity { user: user.into() }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}

/// Work run by [`IdentityScope::run_as`]: builds one reader.
pub type ScopedWork<'w> = dyn FnMut() -> SplitResult<Box<dyn RecordReader>> + 'w;

/// Runs reader construction on behalf of an [`Identity`].
///
/// Storage access performed while a reader is built (SerDe initialization,
/// delta listing, opening files) must happen inside `run_as` so it is
/// authorized as the scan's user rather than the process user.
pub trait IdentityScope: Send + Sync + fmt::Debug {
    /// Run `work` as `identity` and return its result.
    fn run_as(
        &self,
        identity: &Identity,
        work: &mut ScopedWork<'_>,
    ) -> SplitResult<Box<dyn RecordReader>>;
}

/// Runs work as the current process user.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentIdentity;

impl IdentityScope for CurrentIdentity {
    fn run_as(
        &self,
        _identity: &Identity,
        work: &mut ScopedWork<'_>,
    ) -> SplitResult<Box<dyn RecordReader>> {
        work()
    }
}

/// Memory accounting handle passed to reader wrappers.
///
/// Each split's wrapper gets a child named after the split key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceAllocator {
    name: String,
}

impl ResourceAllocator {
    /// Root allocator.
    pub fn new(name: impl Into<String>) -> Self {
        ResourceAllocator { name: name.into() }
    }

    /// Allocator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child allocator scoped under this one.
    pub fn child(&self, name: &str) -> ResourceAllocator {
        ResourceAllocator {
            name: format!("{}:{name}", self.name),
        }
    }
}

/// Per-operator context seen by the pipeline and reader constructors.
#[derive(Clone, Debug)]
pub struct OperatorContext {
    /// Engine options.
    pub options: ScanOptions,
    /// User the scan runs as.
    pub identity: Identity,
    /// Scope reader construction runs in.
    pub identity_scope: Arc<dyn IdentityScope>,
    /// Allocator for reader wrappers.
    pub allocator: ResourceAllocator,
}

impl OperatorContext {
    /// Context running as `identity` in the current process identity scope.
    pub fn new(options: ScanOptions, identity: Identity) -> Self {
        OperatorContext {
            options,
            identity,
            identity_scope: Arc::new(CurrentIdentity),
            allocator: ResourceAllocator::new("hive-scan"),
        }
    }

    /// Builder-style identity scope.
    pub fn with_identity_scope(mut self, scope: Arc<dyn IdentityScope>) -> Self {
        self.identity_scope = scope;
        self
    }

    /// Builder-style allocator.
    pub fn with_allocator(mut self, allocator: ResourceAllocator) -> Self {
        self.allocator = allocator;
        self
    }
}

/// Opaque push-down filter, forwarded to reader constructors unmodified.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScanFilter(pub serde_json::Value);

/// The slice of a Hive table scan assigned to one operator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HiveSubScan {
    /// Splits in the order readers must be produced.
    #[serde(default)]
    pub splits: Vec<DatasetSplit>,

    /// Selected columns, partition columns included.
    #[serde(default)]
    pub columns: Vec<String>,

    /// Optional push-down filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ScanFilter>,
}

impl HiveSubScan {
    /// Sub-scan over `splits` selecting `columns`.
    pub fn new(splits: Vec<DatasetSplit>, columns: Vec<String>) -> Self {
        HiveSubScan {
            splits,
            columns,
            filter: None,
        }
    }

    /// Builder-style filter.
    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}
