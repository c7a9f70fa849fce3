//! Offline strategy resolution from a JSON scan description.

use std::fmt::Write as _;
use std::path::Path;

use hive_scan_core::{
    capability::NativeCapabilities,
    composite::CompositeColumns,
    config::{JobConf, ScanOptions},
    formats::FormatRegistry,
    metadata::{DatasetSplit, InputSplit, PartitionId, PartitionValue, SplitXattr, TableDescriptor},
    reader::{EmptyRecordReader, StrategyConstructors, reader_constructor},
    resolver::StrategyResolver,
    scan::{HiveScanner, HiveSubScan, Identity, OperatorContext, SplitPlan},
};
use serde::Deserialize;
use snafu::ResultExt;

use crate::error::{
    CliResult, EncodeSplitSnafu, ParseDescriptionSnafu, PlanSplitSnafu, ReadDescriptionSnafu,
};

/// User the offline plan is resolved as.
const EXPLAIN_USER: &str = "hivescan";

/// One split as written in a scan description.
///
/// The extended-property payload is given inline and encoded on load.
#[derive(Debug, Deserialize)]
pub struct SplitDescription {
    pub key: String,
    #[serde(default)]
    pub partition_id: Option<PartitionId>,
    pub input_split: InputSplit,
    #[serde(default)]
    pub partition_values: Vec<PartitionValue>,
}

/// Everything needed to resolve a sub-scan without touching storage.
#[derive(Debug, Deserialize)]
pub struct ScanDescription {
    pub table: TableDescriptor,
    pub splits: Vec<SplitDescription>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub options: ScanOptions,
    #[serde(default)]
    pub capabilities: NativeCapabilities,
    #[serde(default)]
    pub conf: JobConf,
}

pub fn load(path: &Path) -> CliResult<ScanDescription> {
    let text = std::fs::read_to_string(path).context(ReadDescriptionSnafu { path })?;
    serde_json::from_str(&text).context(ParseDescriptionSnafu { path })
}

fn dataset_split(desc: &SplitDescription) -> CliResult<DatasetSplit> {
    let xattr = SplitXattr {
        partition_id: desc.partition_id,
        input_split: desc.input_split.clone(),
    };
    let mut split = DatasetSplit::new(desc.key.clone(), &xattr).context(EncodeSplitSnafu {
        split: desc.key.clone(),
    })?;
    split.partition_values = desc.partition_values.clone();
    Ok(split)
}

/// Resolve every split of `desc`, in order. Stops at the first failure.
pub fn explain(desc: &ScanDescription) -> CliResult<Vec<SplitPlan>> {
    let resolver = StrategyResolver::new(FormatRegistry::hive_defaults(), desc.capabilities);
    // Planning never builds readers.
    let constructors = StrategyConstructors::uniform(reader_constructor(|_| {
        Ok(Box::new(EmptyRecordReader::new()))
    }));
    let scanner = HiveScanner::new(resolver, constructors);

    let splits = desc
        .splits
        .iter()
        .map(dataset_split)
        .collect::<CliResult<Vec<_>>>()?;
    let sub_scan = HiveSubScan::new(splits, desc.columns.clone());
    let context = OperatorContext::new(desc.options.clone(), Identity::new(EXPLAIN_USER));
    let composite = CompositeColumns::for_scan(&desc.table, &sub_scan);

    let mut factory =
        scanner.reader_factory(&desc.table, &sub_scan, &context, &desc.conf, &composite);
    let plans = sub_scan
        .splits
        .iter()
        .map(|split| {
            factory.plan_split(split).context(PlanSplitSnafu {
                split: split.split_key.clone(),
            })
        })
        .collect::<CliResult<Vec<_>>>()?;
    Ok(plans)
}

/// One line per split: key, partition, strategy, table strategy and notes.
pub fn render_text(plans: &[SplitPlan]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "split\tpartition\tstrategy\ttable\tnotes");
    for plan in plans {
        let partition = plan
            .partition_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let mut notes = Vec::new();
        if plan.partition_resolved {
            notes.push("partition-resolved");
        }
        if plan.schema_drifted {
            notes.push("drifted");
        }
        if plan.has_pending_deltas {
            notes.push("pending-deltas");
        }
        let notes = if notes.is_empty() {
            "-".to_string()
        } else {
            notes.join(",")
        };
        let _ = writeln!(
            out,
            "{}\t{partition}\t{}\t{}\t{notes}",
            plan.split_key, plan.strategy, plan.table_strategy
        );
    }
    out
}

/// Registered input formats and their strategies.
pub fn render_formats(registry: &FormatRegistry) -> String {
    let mut out = String::new();
    for (format, strategy) in registry.iter() {
        let _ = writeln!(out, "{format}\t{strategy}");
    }
    out
}
