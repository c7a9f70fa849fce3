//! Per-split reader construction.
//!
//! [`HiveScanner`] holds the scan-independent collaborators (resolver,
//! constructor table, SerDe factory, delta lister). A [`ReaderFactory`]
//! binds them to one sub-scan and builds readers split by split:
//!
//! ```text
//! parse xattr -> derive job conf / serdes / layouts -> check deltas
//!   -> resolve (table, then partition if needed) -> construct -> wrap
//! ```
//!
//! Everything after parsing runs inside the operator's identity scope.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use snafu::prelude::*;

use crate::{
    acid::{self, DeltaLister, RecordedDeltas},
    composite::{CompositeReaderConfig, WrapFailure},
    config::JobConf,
    formats::ReaderStrategy,
    layout::ObjectLayout,
    metadata::{DatasetSplit, PartitionId, Properties, SplitXattr, TableDescriptor},
    reader::{ReaderInit, RecordReader, StrategyConstructors},
    resolver::StrategyResolver,
    scan::{
        context::{HiveSubScan, OperatorContext},
        error::{
            ConstructorSnafu, DeltaListingSnafu, LayoutSnafu, MissingPartitionIdSnafu,
            MissingSerializationLibSnafu, NotTransactionalSplitSnafu, ParseSplitXattrSnafu,
            SerdeSnafu, SplitResult, UnknownPartitionSnafu, WrapSnafu,
        },
        readers::ScanReaders,
    },
    serialization::{HiveSerdeFactory, SerDeHandle, SerdeFactory},
};

/// Scan-independent collaborators of the reader pipeline.
#[derive(Debug)]
pub struct HiveScanner {
    resolver: StrategyResolver,
    constructors: StrategyConstructors,
    serdes: Arc<dyn SerdeFactory>,
    deltas: Arc<dyn DeltaLister>,
}

impl HiveScanner {
    /// Scanner using the Hive SerDe registry and recorded delta metadata.
    pub fn new(resolver: StrategyResolver, constructors: StrategyConstructors) -> Self {
        HiveScanner {
            resolver,
            constructors,
            serdes: Arc::new(HiveSerdeFactory),
            deltas: Arc::new(RecordedDeltas),
        }
    }

    /// Builder-style SerDe factory.
    pub fn with_serde_factory(mut self, serdes: Arc<dyn SerdeFactory>) -> Self {
        self.serdes = serdes;
        self
    }

    /// Builder-style delta lister.
    pub fn with_delta_lister(mut self, deltas: Arc<dyn DeltaLister>) -> Self {
        self.deltas = deltas;
        self
    }

    /// The strategy resolver.
    pub fn resolver(&self) -> &StrategyResolver {
        &self.resolver
    }

    /// Bind the scanner to one sub-scan.
    ///
    /// `base_conf` holds engine-level settings; the table properties are
    /// added on top of a copy of it.
    pub fn reader_factory<'a>(
        &'a self,
        table: &'a TableDescriptor,
        sub_scan: &'a HiveSubScan,
        context: &'a OperatorContext,
        base_conf: &JobConf,
        composite: &'a dyn CompositeReaderConfig,
    ) -> ReaderFactory<'a> {
        let mut conf = base_conf.clone();
        conf.add_properties(&table.properties);
        let is_transactional = conf.is_transactional_table();
        ReaderFactory {
            scanner: self,
            table,
            sub_scan,
            context,
            composite,
            base_conf: conf,
            is_transactional,
            table_state: None,
        }
    }

    /// Lazily build one reader per split of `sub_scan`, in split order.
    ///
    /// A sub-scan without splits yields a single [`crate::reader::EmptyRecordReader`].
    pub fn create_readers<'a>(
        &'a self,
        table: &'a TableDescriptor,
        sub_scan: &'a HiveSubScan,
        context: &'a OperatorContext,
        base_conf: &JobConf,
        composite: &'a dyn CompositeReaderConfig,
    ) -> ScanReaders<'a> {
        if sub_scan.splits.is_empty() {
            return ScanReaders::empty();
        }
        ScanReaders::new(self.reader_factory(table, sub_scan, context, base_conf, composite))
    }
}

/// Resolution outcome for one split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    /// Split key.
    pub split_key: String,
    /// Partition the split belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,
    /// Input format the split is read with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,
    /// Strategy chosen from the table-level format.
    pub table_strategy: ReaderStrategy,
    /// Strategy the reader is built with.
    pub strategy: ReaderStrategy,
    /// Whether the partition-level resolution ran.
    pub partition_resolved: bool,
    /// Whether the partition layout differs from the table layout.
    pub schema_drifted: bool,
    /// Whether the table is transactional.
    pub transactional: bool,
    /// Whether the split has pending transactional deltas.
    pub has_pending_deltas: bool,
}

#[derive(Debug)]
struct TableState {
    serde: SerDeHandle,
    layout: ObjectLayout,
}

#[derive(Debug)]
struct PartitionState {
    serde: SerDeHandle,
    layout: ObjectLayout,
}

#[derive(Debug)]
struct PreparedSplit {
    xattr: SplitXattr,
    job_conf: JobConf,
    table: Arc<TableState>,
    partition: Option<PartitionState>,
    plan: SplitPlan,
}

/// Builds the readers of one sub-scan.
///
/// Holds the base job configuration (engine settings plus table
/// properties) and the table SerDe handle and layout, derived on first use
/// and shared by every split.
#[derive(Debug)]
pub struct ReaderFactory<'a> {
    scanner: &'a HiveScanner,
    table: &'a TableDescriptor,
    sub_scan: &'a HiveSubScan,
    context: &'a OperatorContext,
    composite: &'a dyn CompositeReaderConfig,
    base_conf: JobConf,
    is_transactional: bool,
    table_state: Option<Arc<TableState>>,
}

impl<'a> ReaderFactory<'a> {
    /// The sub-scan this factory builds readers for.
    pub fn sub_scan(&self) -> &'a HiveSubScan {
        self.sub_scan
    }

    /// Engine settings plus table properties.
    pub fn base_conf(&self) -> &JobConf {
        &self.base_conf
    }

    /// Whether the table is transactional.
    pub fn is_transactional(&self) -> bool {
        self.is_transactional
    }

    /// Resolve the strategy `split` would be read with, without building a
    /// reader.
    pub fn plan_split(&mut self, split: &DatasetSplit) -> SplitResult<SplitPlan> {
        Ok(self.prepare(split)?.plan)
    }

    /// Build the reader for `split` inside the operator's identity scope.
    pub fn construct(&mut self, split: &DatasetSplit) -> SplitResult<Box<dyn RecordReader>> {
        let context = self.context;
        context
            .identity_scope
            .run_as(&context.identity, &mut || self.build(split))
    }

    fn build(&mut self, split: &DatasetSplit) -> SplitResult<Box<dyn RecordReader>> {
        let prepared = self.prepare(split)?;
        let strategy = prepared.plan.strategy;
        let init = ReaderInit {
            strategy,
            table: self.table,
            split,
            xattr: &prepared.xattr,
            columns: self.composite.inner_columns(),
            context: self.context,
            job_conf: prepared.job_conf.clone(),
            table_serde: &prepared.table.serde,
            table_layout: &prepared.table.layout,
            partition_serde: prepared.partition.as_ref().map(|p| &p.serde),
            partition_layout: prepared.partition.as_ref().map(|p| &p.layout),
            filter: self.sub_scan.filter.as_ref(),
        };

        let inner = self
            .scanner
            .constructors
            .construct(init)
            .context(ConstructorSnafu { strategy })?;
        let allocator = self.context.allocator.child(&split.split_key);
        match self.composite.wrap_if_necessary(&allocator, inner, split) {
            Ok(reader) => Ok(reader),
            Err(WrapFailure { source, mut inner }) => {
                let cleanup = inner.close().err();
                if let Some(err) = &cleanup {
                    warn!(
                        "split {}: failed to release unwrapped reader: {err}",
                        split.split_key
                    );
                }
                Err(source).context(WrapSnafu { cleanup }).map_err(Into::into)
            }
        }
    }

    fn table_state(&mut self) -> SplitResult<Arc<TableState>> {
        if let Some(state) = &self.table_state {
            return Ok(Arc::clone(state));
        }

        let lib = self
            .table
            .serialization_lib
            .as_deref()
            .context(MissingSerializationLibSnafu { partition_id: None })?;
        let serde = self
            .scanner
            .serdes
            .create(&self.base_conf, lib, &self.table.properties)
            .context(SerdeSnafu { partition_id: None })?;
        let layout = serde.object_layout().context(LayoutSnafu {
            lib,
            partition_id: None,
        })?;
        debug!("table layout derived through {lib}: {layout}");

        let state = Arc::new(TableState { serde, layout });
        self.table_state = Some(Arc::clone(&state));
        Ok(state)
    }

    fn partition_state(
        &self,
        partition_id: PartitionId,
        properties: &Properties,
        job_conf: &JobConf,
    ) -> SplitResult<PartitionState> {
        let lib = self
            .table
            .partition_serialization_lib(partition_id)
            .context(MissingSerializationLibSnafu {
                partition_id: Some(partition_id),
            })?;
        let serde = self
            .scanner
            .serdes
            .create(job_conf, lib, properties)
            .context(SerdeSnafu {
                partition_id: Some(partition_id),
            })?;
        let layout = serde.object_layout().context(LayoutSnafu {
            lib,
            partition_id: Some(partition_id),
        })?;
        Ok(PartitionState { serde, layout })
    }

    fn prepare(&mut self, split: &DatasetSplit) -> SplitResult<PreparedSplit> {
        let xattr = split.xattr().context(ParseSplitXattrSnafu)?;
        let mut job_conf = self.base_conf.clone();
        let table_state = self.table_state()?;

        let (partition_id, partition, input_format) = if self.table.is_partitioned() {
            let partition_id = xattr.partition_id.context(MissingPartitionIdSnafu)?;
            ensure!(
                self.table.partition(partition_id).is_some(),
                UnknownPartitionSnafu { partition_id }
            );
            let properties = self.table.merged_partition_properties(partition_id);
            job_conf.add_properties(&properties);
            let partition = self.partition_state(partition_id, &properties, &job_conf)?;
            (
                Some(partition_id),
                Some(partition),
                self.table.partition_input_format(partition_id),
            )
        } else {
            (None, None, self.table.input_format.as_deref())
        };
        if let Some(format) = input_format {
            job_conf.set_input_format(format);
        }

        let is_transactional = self.is_transactional;
        let has_pending_deltas = if is_transactional {
            let acid_split =
                xattr
                    .input_split
                    .as_acid()
                    .context(NotTransactionalSplitSnafu {
                        path: xattr.input_split.path(),
                    })?;
            acid::has_pending_deltas(acid_split, self.scanner.deltas.as_ref())
                .context(DeltaListingSnafu)?
        } else {
            false
        };

        let vectorize = self.context.options.vectorize_orc;
        let resolver = &self.scanner.resolver;
        let table_format = self.table.input_format.as_deref();
        let table_strategy = resolver.resolve(
            table_format,
            vectorize,
            false,
            is_transactional,
            has_pending_deltas,
            &self.base_conf,
        )?;

        let schema_drifted = partition
            .as_ref()
            .is_some_and(|p| p.layout.drifts_from(&table_state.layout));
        let partition_resolved = partition.is_some()
            && (input_format != table_format
                || schema_drifted
                || (is_transactional && has_pending_deltas));
        let strategy = if partition_resolved {
            resolver.resolve(
                input_format,
                vectorize,
                schema_drifted,
                is_transactional,
                has_pending_deltas,
                &job_conf,
            )?
        } else {
            table_strategy
        };

        debug!(
            "split {}: strategy {strategy} (table {table_strategy}, partition resolved: {partition_resolved}, \
             drifted: {schema_drifted}, pending deltas: {has_pending_deltas})",
            split.split_key
        );

        let plan = SplitPlan {
            split_key: split.split_key.clone(),
            partition_id,
            input_format: input_format.map(str::to_string),
            table_strategy,
            strategy,
            partition_resolved,
            schema_drifted,
            transactional: is_transactional,
            has_pending_deltas,
        };
        Ok(PreparedSplit {
            xattr,
            job_conf,
            table: table_state,
            partition,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::{NativeCapabilities, NativeCapability},
        composite::CompositeColumns,
        config::{ORC_VECTORIZE_OPTION, ORC_ZEROCOPY_KEY, ScanOptions},
        formats::{ORC_INPUT_FORMAT, TEXT_INPUT_FORMAT},
        metadata::{DeltaMeta, PartitionOverride},
        scan::{
            test_util::{
                acid_split, file_split, orc_table, recording_constructors, scanner,
                test_context,
            },
            ConstructionError, SplitError,
        },
        serialization::LAZY_SIMPLE_SERDE,
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn plan(
        scanner: &HiveScanner,
        table: &TableDescriptor,
        context: &OperatorContext,
        split: &DatasetSplit,
    ) -> SplitResult<SplitPlan> {
        let sub_scan = HiveSubScan::new(vec![split.clone()], vec!["id".to_string()]);
        let composite = CompositeColumns::for_scan(table, &sub_scan);
        let mut factory =
            scanner.reader_factory(table, &sub_scan, context, &JobConf::new(), &composite);
        factory.plan_split(split)
    }

    #[test]
    fn unpartitioned_orc_resolves_once_and_vectorizes() -> TestResult {
        let scanner = scanner();
        let table = orc_table();
        let context = test_context(ScanOptions::default());

        let got = plan(&scanner, &table, &context, &file_split("s0", None)?)?;
        assert_eq!(got.strategy, ReaderStrategy::ColumnarVectorized);
        assert!(!got.partition_resolved);
        assert_eq!(scanner.resolver().resolve_calls(), 1);
        Ok(())
    }

    #[test]
    fn vectorize_option_off_keeps_native_orc() -> TestResult {
        let scanner = scanner();
        let table = orc_table();
        let context = test_context(ScanOptions::default().with_vectorize_orc(false));
        let got = plan(&scanner, &table, &context, &file_split("s0", None)?)?;
        assert_eq!(got.strategy, ReaderStrategy::ColumnarNative, "{ORC_VECTORIZE_OPTION}");
        Ok(())
    }

    #[test]
    fn drifted_partition_resolves_twice_and_disables_vectorization() -> TestResult {
        let scanner = scanner();
        let table = orc_table().with_partition_column("ds").with_partition(
            0,
            PartitionOverride::default().with_property("columns.types", "bigint:string"),
        );
        let context = test_context(ScanOptions::default());

        let got = plan(&scanner, &table, &context, &file_split("s0", Some(0))?)?;
        assert_eq!(got.table_strategy, ReaderStrategy::ColumnarVectorized);
        assert_eq!(got.strategy, ReaderStrategy::ColumnarNative);
        assert!(got.schema_drifted);
        assert!(got.partition_resolved);
        assert_eq!(scanner.resolver().resolve_calls(), 2);
        Ok(())
    }

    #[test]
    fn matching_partition_reuses_table_strategy() -> TestResult {
        let scanner = scanner();
        let table = orc_table()
            .with_partition_column("ds")
            .with_partition(0, PartitionOverride::default().with_property("owner", "etl"));
        let context = test_context(ScanOptions::default());

        let got = plan(&scanner, &table, &context, &file_split("s0", Some(0))?)?;
        assert_eq!(got.strategy, ReaderStrategy::ColumnarVectorized);
        assert!(!got.partition_resolved);
        assert_eq!(scanner.resolver().resolve_calls(), 1);
        Ok(())
    }

    #[test]
    fn partition_format_change_triggers_second_resolution() -> TestResult {
        let scanner = scanner();
        let table = orc_table().with_partition_column("ds").with_partition(
            0,
            PartitionOverride::default()
                .with_serialization_lib(LAZY_SIMPLE_SERDE)
                .with_input_format(TEXT_INPUT_FORMAT),
        );
        let context = test_context(ScanOptions::default());

        let got = plan(&scanner, &table, &context, &file_split("s0", Some(0))?)?;
        assert_eq!(got.strategy, ReaderStrategy::DelimitedText);
        assert_eq!(got.input_format.as_deref(), Some(TEXT_INPUT_FORMAT));
        assert!(got.partition_resolved);
        assert_eq!(scanner.resolver().resolve_calls(), 2);
        Ok(())
    }

    #[test]
    fn orc_partition_of_text_table_with_equal_layout_vectorizes() -> TestResult {
        let scanner = scanner();
        let table = TableDescriptor::new(LAZY_SIMPLE_SERDE, TEXT_INPUT_FORMAT)
            .with_property("columns", "id,name")
            .with_property("columns.types", "int:string")
            .with_partition_column("ds")
            .with_partition(
                0,
                PartitionOverride::default()
                    .with_serialization_lib(crate::serialization::ORC_SERDE)
                    .with_input_format(ORC_INPUT_FORMAT),
            );
        let context = test_context(ScanOptions::default());

        let got = plan(&scanner, &table, &context, &file_split("s0", Some(0))?)?;
        assert_eq!(got.table_strategy, ReaderStrategy::DelimitedText);
        assert!(got.partition_resolved);
        assert!(!got.schema_drifted);
        assert_eq!(got.strategy, ReaderStrategy::ColumnarVectorized);
        Ok(())
    }

    #[test]
    fn transactional_split_with_deltas_uses_merging_reader() -> TestResult {
        let scanner = scanner();
        let table = orc_table()
            .with_property("transactional", "true")
            .with_partition_column("ds")
            .with_partition(0, PartitionOverride::default());
        let context = test_context(ScanOptions::default());

        let split = acid_split("s0", Some(0), vec![DeltaMeta::new(2, 2)])?;
        let got = plan(&scanner, &table, &context, &split)?;
        assert_eq!(got.table_strategy, ReaderStrategy::ColumnarNative);
        assert_eq!(got.strategy, ReaderStrategy::ColumnarNative);
        assert!(got.has_pending_deltas);
        assert!(got.partition_resolved);
        assert_eq!(scanner.resolver().resolve_calls(), 2);

        let clean = acid_split("s1", Some(0), Vec::new())?;
        let got = plan(&scanner, &table, &context, &clean)?;
        assert_eq!(got.strategy, ReaderStrategy::ColumnarVectorized);
        assert!(!got.partition_resolved);
        Ok(())
    }

    #[test]
    fn transactional_table_rejects_plain_file_split() -> TestResult {
        let scanner = scanner();
        let table = orc_table().with_property("TRANSACTIONAL", "TRUE");
        let context = test_context(ScanOptions::default());

        let err = plan(&scanner, &table, &context, &file_split("s0", None)?)
            .expect_err("plain split on transactional table");
        assert!(matches!(
            err,
            SplitError::Construction {
                source: ConstructionError::NotTransactionalSplit { .. }
            }
        ));
        Ok(())
    }

    #[test]
    fn missing_native_codec_is_a_configuration_error() -> TestResult {
        let scanner = HiveScanner::new(
            StrategyResolver::new(
                crate::formats::FormatRegistry::hive_defaults(),
                NativeCapabilities::all_loaded().with(NativeCapability::Snappy, false),
            ),
            recording_constructors().0,
        );
        let table = orc_table().with_property(ORC_ZEROCOPY_KEY, "true");
        let context = test_context(ScanOptions::default());

        let err = plan(&scanner, &table, &context, &file_split("s0", None)?)
            .expect_err("snappy missing");
        assert!(matches!(err, SplitError::Capability { .. }));
        Ok(())
    }

    #[test]
    fn table_layout_is_derived_once_per_scan() -> TestResult {
        let scanner = scanner();
        let table = orc_table();
        let context = test_context(ScanOptions::default());
        let splits = vec![file_split("s0", None)?, file_split("s1", None)?];
        let sub_scan = HiveSubScan::new(splits, vec!["id".to_string()]);
        let composite = CompositeColumns::for_scan(&table, &sub_scan);
        let mut factory =
            scanner.reader_factory(&table, &sub_scan, &context, &JobConf::new(), &composite);

        factory.plan_split(&sub_scan.splits[0])?;
        let first = factory.table_state.clone().ok_or("table state memoized")?;
        factory.plan_split(&sub_scan.splits[1])?;
        let second = factory.table_state.clone().ok_or("table state memoized")?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[test]
    fn split_conf_carries_partition_properties_and_format() -> TestResult {
        let (constructors, seen) = recording_constructors();
        let scanner = HiveScanner::new(StrategyResolver::default(), constructors);
        let table = orc_table()
            .with_property("owner", "table")
            .with_partition_column("ds")
            .with_partition(0, PartitionOverride::default().with_property("owner", "part"));
        let context = test_context(ScanOptions::default());
        let split = file_split("s0", Some(0))?;
        let sub_scan = HiveSubScan::new(vec![split.clone()], vec!["id".to_string()]);
        let composite = CompositeColumns::for_scan(&table, &sub_scan);
        let mut factory =
            scanner.reader_factory(&table, &sub_scan, &context, &JobConf::new(), &composite);

        factory.construct(&split)?;
        assert_eq!(factory.base_conf().get("owner"), Some("table"));
        assert_eq!(factory.base_conf().input_format(), None);

        let seen = seen.lock().map_err(|_| "poisoned")?;
        let conf = &seen[0].1;
        assert_eq!(conf.get("owner"), Some("part"));
        assert_eq!(conf.input_format(), Some(ORC_INPUT_FORMAT));
        Ok(())
    }

    #[test]
    fn unknown_partition_and_bad_payload_fail_construction() -> TestResult {
        let scanner = scanner();
        let table = orc_table()
            .with_partition_column("ds")
            .with_partition(0, PartitionOverride::default());
        let context = test_context(ScanOptions::default());

        let err = plan(&scanner, &table, &context, &file_split("s0", Some(9))?)
            .expect_err("partition 9 is not described");
        assert!(matches!(
            err,
            SplitError::Construction {
                source: ConstructionError::UnknownPartition { partition_id: 9 }
            }
        ));

        let garbage = DatasetSplit {
            split_key: "bad".to_string(),
            extended_property: b"not json".to_vec(),
            partition_values: Vec::new(),
        };
        let err = plan(&scanner, &table, &context, &garbage).expect_err("payload is not json");
        assert!(matches!(
            err,
            SplitError::Construction {
                source: ConstructionError::ParseSplitXattr { .. }
            }
        ));
        Ok(())
    }
}
