//! Table descriptor and per-partition overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Hive property bag (`TBLPROPERTIES` / SerDe properties).
///
/// Lookups are by key only; ordering is irrelevant to every consumer, the
/// `BTreeMap` just keeps debug output and serialized plans deterministic.
pub type Properties = BTreeMap<String, String>;

/// Identifier of a partition inside a [`TableDescriptor`].
pub type PartitionId = i32;

/// Partition-level values that extend or replace table-level ones.
///
/// Every field is optional: a partition that does not carry its own
/// serialization contract or input format inherits the table's.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionOverride {
    /// Serialization contract (SerDe class name) for this partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialization_lib: Option<String>,

    /// Input format class name for this partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_format: Option<String>,

    /// Partition properties, applied on top of the table properties.
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

impl PartitionOverride {
    /// Set the partition serialization contract.
    pub fn with_serialization_lib(mut self, lib: impl Into<String>) -> Self {
        self.serialization_lib = Some(lib.into());
        self
    }

    /// Set the partition input format.
    pub fn with_input_format(mut self, format: impl Into<String>) -> Self {
        self.input_format = Some(format.into());
        self
    }

    /// Add or replace a single partition property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Table-level metadata for one scan.
///
/// JSON layout example:
///
/// ```json
/// {
///   "serialization_lib": "org.apache.hadoop.hive.ql.io.orc.OrcSerde",
///   "input_format": "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat",
///   "properties": { "columns": "id,name", "columns.types": "int:string" },
///   "partition_columns": ["ds"],
///   "partitions": { "0": { "properties": { "columns.types": "bigint:string" } } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Serialization contract (SerDe class name) declared by the table.
    #[serde(default)]
    pub serialization_lib: Option<String>,

    /// Input format class name declared by the table.
    #[serde(default)]
    pub input_format: Option<String>,

    /// Table properties.
    #[serde(default)]
    pub properties: Properties,

    /// Partition column names, in declaration order. Empty for an
    /// unpartitioned table.
    #[serde(default)]
    pub partition_columns: Vec<String>,

    /// Per-partition overrides keyed by the id carried on each split.
    #[serde(default)]
    pub partitions: BTreeMap<PartitionId, PartitionOverride>,
}

impl TableDescriptor {
    /// Create a descriptor for the given serialization contract and input format.
    pub fn new(serialization_lib: impl Into<String>, input_format: impl Into<String>) -> Self {
        TableDescriptor {
            serialization_lib: Some(serialization_lib.into()),
            input_format: Some(input_format.into()),
            ..TableDescriptor::default()
        }
    }

    /// Add or replace a table property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Append a partition column.
    pub fn with_partition_column(mut self, column: impl Into<String>) -> Self {
        self.partition_columns.push(column.into());
        self
    }

    /// Register the override for partition `id`.
    pub fn with_partition(mut self, id: PartitionId, partition: PartitionOverride) -> Self {
        self.partitions.insert(id, partition);
        self
    }

    /// Whether the table declares any partition column.
    pub fn is_partitioned(&self) -> bool {
        !self.partition_columns.is_empty()
    }

    /// Look up a partition override.
    pub fn partition(&self, id: PartitionId) -> Option<&PartitionOverride> {
        self.partitions.get(&id)
    }

    /// Serialization contract for partition `id`, falling back to the table's.
    pub fn partition_serialization_lib(&self, id: PartitionId) -> Option<&str> {
        self.partition(id)
            .and_then(|p| p.serialization_lib.as_deref())
            .or(self.serialization_lib.as_deref())
    }

    /// Input format for partition `id`, falling back to the table's.
    pub fn partition_input_format(&self, id: PartitionId) -> Option<&str> {
        self.partition(id)
            .and_then(|p| p.input_format.as_deref())
            .or(self.input_format.as_deref())
    }

    /// Effective property bag for partition `id`: table properties first,
    /// then partition properties replacing any key they share.
    pub fn merged_partition_properties(&self, id: PartitionId) -> Properties {
        let mut merged = self.properties.clone();
        if let Some(partition) = self.partition(id) {
            merged.extend(
                partition
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        merged
    }
}
