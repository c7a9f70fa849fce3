//! Split descriptors and their extended-property payload.
//!
//! A [`DatasetSplit`] is what the planner hands to a scan: a key plus an
//! opaque byte payload. The payload decodes to a [`SplitXattr`], which names
//! the partition the split belongs to and the storage-level split handle
//! ([`InputSplit`]) the format decoders work from.

use serde::{Deserialize, Serialize};

use crate::metadata::table::PartitionId;

/// Value of one partition column for a split.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionValue {
    /// Partition column name.
    pub column: String,
    /// Partition value rendered as a string; `None` for the default
    /// (null) partition.
    #[serde(default)]
    pub value: Option<String>,
}

impl PartitionValue {
    /// Create a non-null partition value.
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        PartitionValue {
            column: column.into(),
            value: Some(value.into()),
        }
    }
}

/// A unit of scan work as produced by split generation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetSplit {
    /// Stable identifier used in error messages and logs.
    pub split_key: String,

    /// Encoded [`SplitXattr`] (JSON bytes).
    pub extended_property: Vec<u8>,

    /// Partition values consumed by composite column augmentation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_values: Vec<PartitionValue>,
}

impl DatasetSplit {
    /// Build a split by encoding `xattr` into the extended-property payload.
    pub fn new(split_key: impl Into<String>, xattr: &SplitXattr) -> Result<Self, serde_json::Error> {
        Ok(DatasetSplit {
            split_key: split_key.into(),
            extended_property: serde_json::to_vec(xattr)?,
            partition_values: Vec::new(),
        })
    }

    /// Attach a partition value.
    pub fn with_partition_value(mut self, value: PartitionValue) -> Self {
        self.partition_values.push(value);
        self
    }

    /// Decode the extended-property payload.
    pub fn xattr(&self) -> Result<SplitXattr, serde_json::Error> {
        serde_json::from_slice(&self.extended_property)
    }

    /// Value recorded for partition column `column`, if any.
    pub fn partition_value(&self, column: &str) -> Option<&PartitionValue> {
        self.partition_values.iter().find(|v| v.column == column)
    }
}

/// Decoded extended properties of a split.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitXattr {
    /// Partition the split belongs to; absent for unpartitioned tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_id: Option<PartitionId>,

    /// Storage-level split handle.
    pub input_split: InputSplit,
}

impl SplitXattr {
    /// Extended properties for an unpartitioned split.
    pub fn unpartitioned(input_split: InputSplit) -> Self {
        SplitXattr {
            partition_id: None,
            input_split,
        }
    }

    /// Extended properties for a split of partition `id`.
    pub fn for_partition(id: PartitionId, input_split: InputSplit) -> Self {
        SplitXattr {
            partition_id: Some(id),
            input_split,
        }
    }
}

/// Storage-level split handle, tagged by kind.
///
/// JSON layout example: `{"kind": "file", "path": "/t/000000_0", "start": 0, "length": 512}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSplit {
    /// Byte range of a plain data file.
    File(FileSplit),
    /// Split of a transactional (ACID) table.
    Acid(AcidSplit),
}

impl InputSplit {
    /// Path of the file (or directory for delta-only ACID splits).
    pub fn path(&self) -> &str {
        match self {
            InputSplit::File(f) => &f.path,
            InputSplit::Acid(a) => &a.path,
        }
    }

    /// The transactional view of this split, if it has one.
    pub fn as_acid(&self) -> Option<&AcidSplit> {
        match self {
            InputSplit::Acid(a) => Some(a),
            InputSplit::File(_) => None,
        }
    }
}

/// Byte range of a plain data file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSplit {
    /// File path.
    pub path: String,
    /// First byte of the range.
    #[serde(default)]
    pub start: u64,
    /// Length of the range in bytes.
    #[serde(default)]
    pub length: u64,
}

/// Split of a transactional table.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcidSplit {
    /// Path of the base file, or of the transactional root when the split
    /// has no base.
    pub path: String,
    /// First byte of the range.
    #[serde(default)]
    pub start: u64,
    /// Length of the range in bytes.
    #[serde(default)]
    pub length: u64,
    /// Whether the split reads a merged base file.
    pub has_base: bool,
    /// Whether the base file uses the pre-transactional ("original") layout,
    /// i.e. sits directly in the partition directory instead of a `base_N`
    /// directory.
    #[serde(default)]
    pub is_original: bool,
    /// Delta metadata recorded for the split at planning time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deltas: Vec<DeltaMeta>,
}

/// Write-id range (and optional statement ids) of one delta directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeltaMeta {
    /// Lowest write id in the delta.
    pub min_write_id: u64,
    /// Highest write id in the delta.
    pub max_write_id: u64,
    /// Statement ids; each one maps to its own delta directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statement_ids: Vec<u32>,
}

impl DeltaMeta {
    /// Delta covering `[min, max]` without statement ids.
    pub fn new(min_write_id: u64, max_write_id: u64) -> Self {
        DeltaMeta {
            min_write_id,
            max_write_id,
            statement_ids: Vec::new(),
        }
    }
}
