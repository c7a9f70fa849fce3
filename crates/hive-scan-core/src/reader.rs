//! Record readers and the typed constructor table.
//!
//! Format decoders live outside this crate. The pipeline only needs to build
//! one [`RecordReader`] per split, so every [`ReaderStrategy`] is bound to a
//! [`ReaderConstructor`] with the same signature: it receives a
//! [`ReaderInit`] describing the split and returns a boxed reader.

use std::{fmt, sync::Arc};

use arrow::{
    datatypes::{Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};
use snafu::prelude::*;

use crate::{
    config::JobConf,
    formats::ReaderStrategy,
    layout::ObjectLayout,
    metadata::{DatasetSplit, SplitXattr, TableDescriptor},
    scan::{OperatorContext, ScanFilter},
    serialization::SerDeHandle,
};

/// Error type returned by host-provided collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a reader while producing or releasing batches.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReaderError {
    /// Building or transforming a batch failed.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },

    /// The reader was used after being released.
    #[snafu(display("Reader for split {split} has already been released"))]
    Released {
        /// Split key of the reader.
        split: String,
    },

    /// Failure reported by a host reader implementation.
    #[snafu(display("{source}"))]
    External {
        /// The host error.
        source: BoxError,
    },
}

impl ReaderError {
    /// Wrap a host error.
    pub fn external(source: impl Into<BoxError>) -> Self {
        ReaderError::External {
            source: source.into(),
        }
    }
}

/// A pull-based source of record batches for one split.
pub trait RecordReader: Send {
    /// Schema of the batches this reader yields.
    fn schema(&self) -> SchemaRef;

    /// Next batch, or `None` at end of data.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError>;

    /// Release the reader's resources. Called at most once by the pipeline.
    fn close(&mut self) -> Result<(), ReaderError> {
        Ok(())
    }
}

impl fmt::Debug for dyn RecordReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordReader")
            .field("columns", &self.schema().fields().len())
            .finish()
    }
}

/// Reader with no columns and no rows.
///
/// Returned as the only reader of a scan with no splits.
#[derive(Debug)]
pub struct EmptyRecordReader {
    schema: SchemaRef,
}

impl EmptyRecordReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        EmptyRecordReader {
            schema: Arc::new(Schema::empty()),
        }
    }
}

impl Default for EmptyRecordReader {
    fn default() -> Self {
        EmptyRecordReader::new()
    }
}

impl RecordReader for EmptyRecordReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        Ok(None)
    }
}

/// Everything a constructor receives for one split.
pub struct ReaderInit<'a> {
    /// Strategy the constructor was selected for.
    pub strategy: ReaderStrategy,
    /// Table being scanned.
    pub table: &'a TableDescriptor,
    /// The split to read.
    pub split: &'a DatasetSplit,
    /// Decoded extended properties of `split`.
    pub xattr: &'a SplitXattr,
    /// Columns the reader must produce (partition columns excluded).
    pub columns: &'a [String],
    /// Operator context of the scan.
    pub context: &'a OperatorContext,
    /// Split-private job configuration.
    pub job_conf: JobConf,
    /// Table serialization handle.
    pub table_serde: &'a SerDeHandle,
    /// Table layout.
    pub table_layout: &'a ObjectLayout,
    /// Partition serialization handle, for partitioned tables.
    pub partition_serde: Option<&'a SerDeHandle>,
    /// Partition layout, for partitioned tables.
    pub partition_layout: Option<&'a ObjectLayout>,
    /// Push-down filter, forwarded unmodified.
    pub filter: Option<&'a ScanFilter>,
}

impl fmt::Debug for ReaderInit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderInit")
            .field("strategy", &self.strategy)
            .field("split", &self.split.split_key)
            .field("columns", &self.columns)
            .field("partitioned", &self.partition_serde.is_some())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Builds a reader for one split.
pub type ReaderConstructor =
    Arc<dyn Fn(ReaderInit<'_>) -> Result<Box<dyn RecordReader>, BoxError> + Send + Sync>;

/// Wrap a closure or function as a [`ReaderConstructor`].
pub fn reader_constructor<F>(f: F) -> ReaderConstructor
where
    F: Fn(ReaderInit<'_>) -> Result<Box<dyn RecordReader>, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One constructor per [`ReaderStrategy`].
///
/// The table is total: every strategy always has a constructor.
#[derive(Clone)]
pub struct StrategyConstructors {
    default: ReaderConstructor,
    columnar_native: ReaderConstructor,
    columnar_vectorized: ReaderConstructor,
    row_oriented_native: ReaderConstructor,
    self_describing_container: ReaderConstructor,
    delimited_text: ReaderConstructor,
    columnar_parquet: ReaderConstructor,
}

impl StrategyConstructors {
    /// Bind every strategy to `constructor`.
    pub fn uniform(constructor: ReaderConstructor) -> Self {
        StrategyConstructors {
            default: Arc::clone(&constructor),
            columnar_native: Arc::clone(&constructor),
            columnar_vectorized: Arc::clone(&constructor),
            row_oriented_native: Arc::clone(&constructor),
            self_describing_container: Arc::clone(&constructor),
            delimited_text: Arc::clone(&constructor),
            columnar_parquet: constructor,
        }
    }

    /// Rebind `strategy` to `constructor`.
    pub fn with(mut self, strategy: ReaderStrategy, constructor: ReaderConstructor) -> Self {
        *self.slot_mut(strategy) = constructor;
        self
    }

    /// Constructor bound to `strategy`.
    pub fn constructor(&self, strategy: ReaderStrategy) -> &ReaderConstructor {
        match strategy {
            ReaderStrategy::Default => &self.default,
            ReaderStrategy::ColumnarNative => &self.columnar_native,
            ReaderStrategy::ColumnarVectorized => &self.columnar_vectorized,
            ReaderStrategy::RowOrientedNative => &self.row_oriented_native,
            ReaderStrategy::SelfDescribingContainer => &self.self_describing_container,
            ReaderStrategy::DelimitedText => &self.delimited_text,
            ReaderStrategy::ColumnarParquet => &self.columnar_parquet,
        }
    }

    fn slot_mut(&mut self, strategy: ReaderStrategy) -> &mut ReaderConstructor {
        match strategy {
            ReaderStrategy::Default => &mut self.default,
            ReaderStrategy::ColumnarNative => &mut self.columnar_native,
            ReaderStrategy::ColumnarVectorized => &mut self.columnar_vectorized,
            ReaderStrategy::RowOrientedNative => &mut self.row_oriented_native,
            ReaderStrategy::SelfDescribingContainer => &mut self.self_describing_container,
            ReaderStrategy::DelimitedText => &mut self.delimited_text,
            ReaderStrategy::ColumnarParquet => &mut self.columnar_parquet,
        }
    }

    /// Build a reader with the constructor bound to `init.strategy`.
    pub fn construct(&self, init: ReaderInit<'_>) -> Result<Box<dyn RecordReader>, BoxError> {
        let constructor = self.constructor(init.strategy);
        constructor(init)
    }
}

impl fmt::Debug for StrategyConstructors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<&str> = ReaderStrategy::ALL.iter().map(|s| s.name()).collect();
        f.debug_struct("StrategyConstructors")
            .field("strategies", &bound)
            .finish()
    }
}
