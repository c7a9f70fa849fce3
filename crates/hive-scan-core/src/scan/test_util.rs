//! Shared fixtures for pipeline unit tests.
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use arrow::{
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};

use crate::{
    config::{JobConf, ScanOptions},
    formats::{ORC_INPUT_FORMAT, ReaderStrategy},
    metadata::{
        AcidSplit, DatasetSplit, DeltaMeta, FileSplit, InputSplit, PartitionId, SplitXattr,
        TableDescriptor,
    },
    reader::{ReaderError, RecordReader, StrategyConstructors, reader_constructor},
    resolver::StrategyResolver,
    scan::{HiveScanner, Identity, OperatorContext},
    serialization::ORC_SERDE,
};

pub(crate) fn orc_table() -> TableDescriptor {
    TableDescriptor::new(ORC_SERDE, ORC_INPUT_FORMAT)
        .with_property("columns", "id,name")
        .with_property("columns.types", "int:string")
}

pub(crate) fn test_context(options: ScanOptions) -> OperatorContext {
    OperatorContext::new(options, Identity::new("hive"))
}

fn encode(
    key: &str,
    partition_id: Option<PartitionId>,
    input_split: InputSplit,
) -> Result<DatasetSplit, serde_json::Error> {
    let xattr = SplitXattr {
        partition_id,
        input_split,
    };
    DatasetSplit::new(key, &xattr)
}

pub(crate) fn file_split(
    key: &str,
    partition_id: Option<PartitionId>,
) -> Result<DatasetSplit, serde_json::Error> {
    encode(
        key,
        partition_id,
        InputSplit::File(FileSplit {
            path: format!("/warehouse/t/{key}/000000_0"),
            start: 0,
            length: 1024,
        }),
    )
}

pub(crate) fn acid_split(
    key: &str,
    partition_id: Option<PartitionId>,
    deltas: Vec<DeltaMeta>,
) -> Result<DatasetSplit, serde_json::Error> {
    encode(
        key,
        partition_id,
        InputSplit::Acid(AcidSplit {
            path: format!("/warehouse/t/{key}/base_0000001/bucket_00000"),
            start: 0,
            length: 1024,
            has_base: true,
            is_original: false,
            deltas,
        }),
    )
}

struct StubReader {
    schema: SchemaRef,
}

impl RecordReader for StubReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        Ok(None)
    }
}

fn id_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]))
}

/// Seen `(strategy, job conf)` per constructed split.
pub(crate) type SeenInits = Arc<Mutex<Vec<(ReaderStrategy, JobConf)>>>;

/// Constructors that record what they were called with.
pub(crate) fn recording_constructors() -> (StrategyConstructors, SeenInits) {
    let seen: SeenInits = Arc::default();
    let sink = Arc::clone(&seen);
    let constructors = StrategyConstructors::uniform(reader_constructor(move |init| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((init.strategy, init.job_conf.clone()));
        Ok(Box::new(StubReader {
            schema: id_schema(),
        }))
    }));
    (constructors, seen)
}

pub(crate) fn scanner() -> HiveScanner {
    HiveScanner::new(StrategyResolver::default(), recording_constructors().0)
}

#[derive(Debug, Default)]
struct CloseLogInner {
    built: usize,
    closes: BTreeMap<String, usize>,
}

/// Counts reader builds and closes per split key.
#[derive(Clone, Debug, Default)]
pub(crate) struct CloseLog {
    inner: Arc<Mutex<CloseLogInner>>,
}

impl CloseLog {
    pub(crate) fn built(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .built
    }

    pub(crate) fn closes(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closes
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

struct CountingReader {
    key: String,
    log: CloseLog,
    fail_close: bool,
}

impl RecordReader for CountingReader {
    fn schema(&self) -> SchemaRef {
        id_schema()
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        Ok(None)
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        *self
            .log
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closes
            .entry(self.key.clone())
            .or_default() += 1;
        if self.fail_close {
            Err(ReaderError::external(format!("close failed for {}", self.key)))
        } else {
            Ok(())
        }
    }
}

/// Constructors building [`CountingReader`]s. Readers for `fail_close` keys
/// fail to close; splits in `fail_build` fail to construct.
pub(crate) fn counting_constructors(
    log: &CloseLog,
    fail_close: &[&str],
    fail_build: &[&str],
) -> StrategyConstructors {
    let log = log.clone();
    let fail_close: Vec<String> = fail_close.iter().map(|s| s.to_string()).collect();
    let fail_build: Vec<String> = fail_build.iter().map(|s| s.to_string()).collect();
    StrategyConstructors::uniform(reader_constructor(move |init| {
        let key = init.split.split_key.clone();
        if fail_build.contains(&key) {
            return Err(format!("decoder failed for {key}").into());
        }
        log.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .built += 1;
        Ok(Box::new(CountingReader {
            fail_close: fail_close.contains(&key),
            key,
            log: log.clone(),
        }))
    }))
}
