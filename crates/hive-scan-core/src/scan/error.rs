//! Error types and SNAFU context selectors for the scan pipeline.
//!
//! Per-split failures are built as [`ConstructionError`] or
//! [`CapabilityError`] (joined in [`SplitError`]) and surfaced to the caller
//! as a [`ScanError`] naming the split. Failures while releasing readers
//! ([`ResourceError`]) never replace the surfaced error; they are attached to
//! it as `suppressed`.

use std::fmt::Write as _;

use snafu::prelude::*;

use crate::{
    acid::DeltaError,
    capability::CapabilityError,
    formats::ReaderStrategy,
    layout::LayoutError,
    metadata::PartitionId,
    reader::{BoxError, ReaderError},
    serialization::SerdeError,
};

/// Failure to build the reader for one split.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConstructionError {
    /// The split's extended-property payload could not be decoded.
    #[snafu(display("Failed to decode split extended properties: {source}"))]
    ParseSplitXattr {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Neither the partition nor the table names a serialization library.
    #[snafu(display("No serialization library declared for {}", scope_name(*partition_id)))]
    MissingSerializationLib {
        /// Partition being resolved, `None` at table level.
        partition_id: Option<PartitionId>,
    },

    /// A split of a partitioned table carries no partition id.
    #[snafu(display("Split of a partitioned table carries no partition id"))]
    MissingPartitionId,

    /// The split refers to a partition the table does not describe.
    #[snafu(display("Unknown partition id {partition_id}"))]
    UnknownPartition {
        /// Partition id carried by the split.
        partition_id: PartitionId,
    },

    /// The serialization handle could not be created.
    #[snafu(display("Failed to create serialization handle for {}: {source}", scope_name(*partition_id)))]
    Serde {
        /// Partition being resolved, `None` at table level.
        partition_id: Option<PartitionId>,
        /// Underlying SerDe error.
        source: SerdeError,
    },

    /// The object layout could not be derived.
    #[snafu(display("Failed to derive object layout from {lib} for {}: {source}", scope_name(*partition_id)))]
    Layout {
        /// SerDe class the layout was derived through.
        lib: String,
        /// Partition being resolved, `None` at table level.
        partition_id: Option<PartitionId>,
        /// Underlying layout error.
        source: LayoutError,
    },

    /// A transactional table produced a split without transactional metadata.
    #[snafu(display("Split {path} of a transactional table is not a transactional split"))]
    NotTransactionalSplit {
        /// Path of the offending split.
        path: String,
    },

    /// Listing the split's delta directories failed.
    #[snafu(display("Failed to inspect transactional deltas: {source}"))]
    DeltaListing {
        /// Underlying listing error.
        #[snafu(source, backtrace)]
        source: DeltaError,
    },

    /// Running work under the scan identity failed.
    #[snafu(display("Failed to run as user {user}: {source}"))]
    Identity {
        /// User the work was to run as.
        user: String,
        /// Error reported by the identity scope.
        source: BoxError,
    },

    /// The constructor bound to the chosen strategy failed.
    #[snafu(display("Failed to construct {strategy} reader: {source}"))]
    Constructor {
        /// Strategy whose constructor failed.
        strategy: ReaderStrategy,
        /// Error reported by the constructor.
        source: BoxError,
    },

    /// Wrapping the reader with composite columns failed. The inner reader
    /// has been released.
    #[snafu(display("Failed to wrap reader with composite columns: {source}{}", cleanup_note(cleanup.as_ref())))]
    Wrap {
        /// Error reported by the composite configuration.
        source: BoxError,
        /// Failure to release the inner reader, if any.
        cleanup: Option<ReaderError>,
    },
}

impl ConstructionError {
    /// Failure of an [`crate::scan::IdentityScope`] to run work as `user`.
    ///
    /// Scopes return it (converted into a [`SplitError`]) instead of running
    /// the work.
    pub fn identity(user: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ConstructionError::Identity {
            user: user.into(),
            source: source.into(),
        }
    }
}

fn cleanup_note(cleanup: Option<&ReaderError>) -> String {
    match cleanup {
        Some(err) => format!(" (releasing the inner reader also failed: {err})"),
        None => String::new(),
    }
}

fn scope_name(partition_id: Option<PartitionId>) -> String {
    match partition_id {
        Some(id) => format!("partition {id}"),
        None => "table".to_string(),
    }
}

/// Per-split failure: either a configuration problem or a construction problem.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SplitError {
    /// A native prerequisite of the chosen strategy is missing.
    #[snafu(transparent)]
    Capability {
        /// Underlying capability error.
        source: CapabilityError,
    },

    /// The reader could not be built.
    #[snafu(transparent)]
    Construction {
        /// Underlying construction error.
        source: ConstructionError,
    },
}

/// Result alias for per-split work.
pub type SplitResult<T> = Result<T, SplitError>;

/// Failure to release one reader.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResourceError {
    /// The reader's `close` failed.
    #[snafu(display("Failed to release reader for split {split}: {source}"))]
    Release {
        /// Split key of the reader.
        split: String,
        /// Error reported by the reader.
        source: ReaderError,
    },
}

fn suppressed_note(suppressed: &[ResourceError]) -> String {
    let mut note = String::new();
    if !suppressed.is_empty() {
        let _ = write!(note, " ({} suppressed:", suppressed.len());
        for err in suppressed {
            let _ = write!(note, " {err};");
        }
        note.pop();
        note.push(')');
    }
    note
}

fn failure_list(failures: &[ResourceError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the reader sequence.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScanError {
    /// A native prerequisite is missing; the scan cannot run as configured.
    #[snafu(display("Invalid configuration for split {split}: {source}{}", suppressed_note(suppressed)))]
    Configuration {
        /// Split being resolved.
        split: String,
        /// Underlying capability error.
        source: CapabilityError,
        /// Release failures of previously built readers.
        suppressed: Vec<ResourceError>,
    },

    /// The reader for a split could not be built.
    #[snafu(display("Failed to create reader for split {split}: {source}{}", suppressed_note(suppressed)))]
    Construction {
        /// Split being constructed.
        split: String,
        /// Underlying construction error.
        #[snafu(source(from(ConstructionError, Box::new)))]
        source: Box<ConstructionError>,
        /// Release failures of previously built readers.
        suppressed: Vec<ResourceError>,
    },

    /// Releasing readers at scan teardown failed.
    #[snafu(context(name(ScanReleaseSnafu)))]
    #[snafu(display("Failed to release {} reader(s): {}", failures.len(), failure_list(failures)))]
    Release {
        /// Every release failure, in split order.
        failures: Vec<ResourceError>,
    },
}

impl ScanError {
    /// Surface a per-split failure with the release failures it caused.
    pub(crate) fn for_split(
        split: impl Into<String>,
        error: SplitError,
        suppressed: Vec<ResourceError>,
    ) -> Self {
        let split = split.into();
        match error {
            SplitError::Capability { source } => ScanError::Configuration {
                split,
                source,
                suppressed,
            },
            SplitError::Construction { source } => ScanError::Construction {
                split,
                source: Box::new(source),
                suppressed,
            },
        }
    }

    /// Release failures attached to this error.
    pub fn suppressed(&self) -> &[ResourceError] {
        match self {
            ScanError::Configuration { suppressed, .. }
            | ScanError::Construction { suppressed, .. } => suppressed,
            ScanError::Release { failures } => failures,
        }
    }

    /// Split the error was raised for, if it concerns a single split.
    pub fn split_key(&self) -> Option<&str> {
        match self {
            ScanError::Configuration { split, .. } | ScanError::Construction { split, .. } => {
                Some(split)
            }
            ScanError::Release { .. } => None,
        }
    }
}
