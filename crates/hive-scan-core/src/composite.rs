//! Composite column augmentation.
//!
//! Partition columns are not stored in the data files of a Hive table. The
//! pipeline asks readers for the remaining ("inner") columns only, and a
//! [`CompositeReaderConfig`] then wraps each reader so its batches carry the
//! partition values of the split as extra columns.

use std::{fmt, sync::Arc};

use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use log::debug;
use snafu::prelude::*;

use crate::{
    metadata::{DatasetSplit, TableDescriptor},
    reader::{ArrowSnafu, BoxError, ReaderError, RecordReader},
    scan::{HiveSubScan, ResourceAllocator},
};

/// Decides which columns inner readers produce and wraps them as needed.
pub trait CompositeReaderConfig: Send + Sync + fmt::Debug {
    /// Columns inner readers must produce.
    fn inner_columns(&self) -> &[String];

    /// Wrap `inner` so it yields every selected column for `split`, or
    /// return it unchanged when nothing needs to be added.
    ///
    /// On failure `inner` is handed back inside the [`WrapFailure`] so the
    /// caller can release it.
    fn wrap_if_necessary(
        &self,
        allocator: &ResourceAllocator,
        inner: Box<dyn RecordReader>,
        split: &DatasetSplit,
    ) -> Result<Box<dyn RecordReader>, WrapFailure>;
}

/// A failed [`CompositeReaderConfig::wrap_if_necessary`] call.
pub struct WrapFailure {
    /// Why wrapping failed.
    pub source: BoxError,
    /// The reader that was to be wrapped, still open.
    pub inner: Box<dyn RecordReader>,
}

impl WrapFailure {
    /// Failure `source` while wrapping `inner`.
    pub fn new(source: impl Into<BoxError>, inner: Box<dyn RecordReader>) -> Self {
        WrapFailure {
            source: source.into(),
            inner,
        }
    }
}

impl fmt::Debug for WrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapFailure")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Appends selected partition columns as Utf8 constants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeColumns {
    inner: Vec<String>,
    appended: Vec<String>,
}

impl CompositeColumns {
    /// Split `selected` into inner columns and the partition columns to append.
    ///
    /// Column names are matched case-insensitively. Appended columns keep
    /// their order in `selected`.
    pub fn new(selected: &[String], partition_columns: &[String]) -> Self {
        let is_partition =
            |c: &str| partition_columns.iter().any(|p| p.eq_ignore_ascii_case(c));
        let (appended, inner): (Vec<String>, Vec<String>) =
            selected.iter().cloned().partition(|c| is_partition(c.as_str()));
        CompositeColumns { inner, appended }
    }

    /// Configuration for `sub_scan` over `table`.
    pub fn for_scan(table: &TableDescriptor, sub_scan: &HiveSubScan) -> Self {
        CompositeColumns::new(&sub_scan.columns, &table.partition_columns)
    }

    /// Partition columns appended to each batch.
    pub fn appended_columns(&self) -> &[String] {
        &self.appended
    }
}

impl CompositeReaderConfig for CompositeColumns {
    fn inner_columns(&self) -> &[String] {
        &self.inner
    }

    fn wrap_if_necessary(
        &self,
        allocator: &ResourceAllocator,
        inner: Box<dyn RecordReader>,
        split: &DatasetSplit,
    ) -> Result<Box<dyn RecordReader>, WrapFailure> {
        if self.appended.is_empty() {
            return Ok(inner);
        }

        let values: Vec<Option<String>> = self
            .appended
            .iter()
            .map(|column| {
                split
                    .partition_values
                    .iter()
                    .find(|v| v.column.eq_ignore_ascii_case(column))
                    .and_then(|v| v.value.clone())
            })
            .collect();

        debug!(
            "split {}: appending {} partition column(s) (allocator {})",
            split.split_key,
            self.appended.len(),
            allocator.name()
        );
        Ok(Box::new(PartitionValueReader::new(
            inner,
            &self.appended,
            values,
        )))
    }
}

/// Reader appending constant partition columns to an inner reader.
struct PartitionValueReader {
    inner: Box<dyn RecordReader>,
    schema: SchemaRef,
    values: Vec<Option<String>>,
}

impl PartitionValueReader {
    fn new(inner: Box<dyn RecordReader>, columns: &[String], values: Vec<Option<String>>) -> Self {
        let inner_schema = inner.schema();
        let mut fields: Vec<Arc<Field>> = inner_schema.fields().iter().cloned().collect();
        fields.extend(
            columns
                .iter()
                .map(|c| Arc::new(Field::new(c.clone(), DataType::Utf8, true))),
        );
        PartitionValueReader {
            inner,
            schema: Arc::new(Schema::new(fields)),
            values,
        }
    }
}

impl RecordReader for PartitionValueReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        let Some(batch) = self.inner.next_batch()? else {
            return Ok(None);
        };
        let rows = batch.num_rows();
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
        for value in &self.values {
            let array = StringArray::from(vec![value.as_deref(); rows]);
            columns.push(Arc::new(array));
        }
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        let batch = RecordBatch::try_new_with_options(Arc::clone(&self.schema), columns, &options)
            .context(ArrowSnafu)?;
        Ok(Some(batch))
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        self.inner.close()
    }
}
