#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use arrow::array::Int32Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use hive_scan_core::{
    formats::{ORC_INPUT_FORMAT, ReaderStrategy},
    metadata::{
        AcidSplit, DatasetSplit, DeltaMeta, FileSplit, InputSplit, PartitionId, PartitionValue,
        SplitXattr, TableDescriptor,
    },
    reader::{ReaderError, RecordReader, StrategyConstructors, reader_constructor},
    scan::ScanFilter,
    serialization::ORC_SERDE,
};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Unpartitioned ORC table with `id int, name string`.
pub fn orc_table() -> TableDescriptor {
    TableDescriptor::new(ORC_SERDE, ORC_INPUT_FORMAT)
        .with_property("columns", "id,name")
        .with_property("columns.types", "int:string")
}

pub fn file_split(key: &str, partition_id: Option<PartitionId>) -> DatasetSplit {
    let xattr = SplitXattr {
        partition_id,
        input_split: InputSplit::File(FileSplit {
            path: format!("/warehouse/t/{key}/000000_0"),
            start: 0,
            length: 4096,
        }),
    };
    DatasetSplit::new(key, &xattr).expect("encode split")
}

pub fn acid_split(
    key: &str,
    partition_id: Option<PartitionId>,
    path: &str,
    deltas: Vec<DeltaMeta>,
) -> DatasetSplit {
    let xattr = SplitXattr {
        partition_id,
        input_split: InputSplit::Acid(AcidSplit {
            path: path.to_string(),
            start: 0,
            length: 4096,
            has_base: true,
            is_original: false,
            deltas,
        }),
    };
    DatasetSplit::new(key, &xattr).expect("encode split")
}

pub fn with_ds(split: DatasetSplit, ds: &str) -> DatasetSplit {
    split.with_partition_value(PartitionValue::new("ds", ds))
}

/// What a constructor saw for one split.
#[derive(Clone, Debug)]
pub struct Construction {
    pub split_key: String,
    pub strategy: ReaderStrategy,
    pub columns: Vec<String>,
    pub filter: Option<ScanFilter>,
    pub partitioned: bool,
}

#[derive(Debug, Default)]
struct RecordState {
    constructions: Vec<Construction>,
    closes: BTreeMap<String, usize>,
}

/// Shared record of constructions and closes.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecordState>>,
}

impl Recorder {
    pub fn constructions(&self) -> Vec<Construction> {
        self.state.lock().expect("recorder lock").constructions.clone()
    }

    pub fn strategies(&self) -> Vec<ReaderStrategy> {
        self.constructions().iter().map(|c| c.strategy).collect()
    }

    pub fn closes(&self, key: &str) -> usize {
        self.state
            .lock()
            .expect("recorder lock")
            .closes
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn record_close(&self, key: &str) {
        *self
            .state
            .lock()
            .expect("recorder lock")
            .closes
            .entry(key.to_string())
            .or_default() += 1;
    }
}

/// Reader producing one batch of `rows` ids, then end of data.
pub struct CountingReader {
    key: String,
    schema: SchemaRef,
    rows: Option<i32>,
    recorder: Recorder,
    fail_close: bool,
}

impl RecordReader for CountingReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        let Some(rows) = self.rows.take() else {
            return Ok(None);
        };
        let ids = Int32Array::from((0..rows).collect::<Vec<_>>());
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), vec![Arc::new(ids)])
            .map_err(ReaderError::external)?;
        Ok(Some(batch))
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        self.recorder.record_close(&self.key);
        if self.fail_close {
            Err(ReaderError::external(format!("close failed for {}", self.key)))
        } else {
            Ok(())
        }
    }
}

/// Options for [`recording_constructors`].
#[derive(Clone, Debug, Default)]
pub struct ReaderBehaviour {
    pub fail_close: Vec<String>,
    pub fail_build: Vec<String>,
    pub rows: i32,
}

/// Constructors recording every call into `recorder`.
pub fn recording_constructors(
    recorder: &Recorder,
    behaviour: ReaderBehaviour,
) -> StrategyConstructors {
    let recorder = recorder.clone();
    StrategyConstructors::uniform(reader_constructor(move |init| {
        let key = init.split.split_key.clone();
        if behaviour.fail_build.contains(&key) {
            return Err(format!("decoder failed for {key}").into());
        }
        recorder
            .state
            .lock()
            .expect("recorder lock")
            .constructions
            .push(Construction {
                split_key: key.clone(),
                strategy: init.strategy,
                columns: init.columns.to_vec(),
                filter: init.filter.cloned(),
                partitioned: init.partition_serde.is_some(),
            });
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]));
        Ok(Box::new(CountingReader {
            fail_close: behaviour.fail_close.contains(&key),
            key,
            schema,
            rows: Some(behaviour.rows),
            recorder: recorder.clone(),
        }))
    }))
}
