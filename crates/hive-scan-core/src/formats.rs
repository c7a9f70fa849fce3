//! Input formats and the reader strategies they map to.
//!
//! The [`FormatRegistry`] is an immutable lookup table from a canonical input
//! format class name to a [`ReaderStrategy`]. It is built once (usually via
//! [`FormatRegistry::hive_defaults`]) and handed to the
//! [`crate::resolver::StrategyResolver`] as configuration.
//!
//! Lookups never invent a fallback: an unknown format yields `None`, and it is
//! the resolver that turns that into [`ReaderStrategy::Default`].

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// ORC input format.
pub const ORC_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.orc.OrcInputFormat";
/// Avro container input format.
pub const AVRO_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.avro.AvroContainerInputFormat";
/// RCFile input format.
pub const RCFILE_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.RCFileInputFormat";
/// Parquet input format.
pub const PARQUET_INPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat";
/// Delimited text input format.
pub const TEXT_INPUT_FORMAT: &str = "org.apache.hadoop.mapred.TextInputFormat";

/// Record-decoding strategy chosen for a split.
///
/// The set is closed: every variant has exactly one constructor slot in
/// [`crate::reader::StrategyConstructors`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderStrategy {
    /// Generic reader driven by the input format and SerDe alone.
    Default,
    /// Native ORC reader (row-at-a-time, handles ACID merges).
    ColumnarNative,
    /// Vectorized ORC reader.
    ColumnarVectorized,
    /// Native RCFile reader.
    RowOrientedNative,
    /// Avro container reader.
    SelfDescribingContainer,
    /// Delimited text reader.
    DelimitedText,
    /// Parquet reader.
    ColumnarParquet,
}

impl ReaderStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [ReaderStrategy; 7] = [
        ReaderStrategy::Default,
        ReaderStrategy::ColumnarNative,
        ReaderStrategy::ColumnarVectorized,
        ReaderStrategy::RowOrientedNative,
        ReaderStrategy::SelfDescribingContainer,
        ReaderStrategy::DelimitedText,
        ReaderStrategy::ColumnarParquet,
    ];

    /// Short, stable name used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ReaderStrategy::Default => "default",
            ReaderStrategy::ColumnarNative => "orc",
            ReaderStrategy::ColumnarVectorized => "orc-vectorized",
            ReaderStrategy::RowOrientedNative => "rcfile",
            ReaderStrategy::SelfDescribingContainer => "avro",
            ReaderStrategy::DelimitedText => "text",
            ReaderStrategy::ColumnarParquet => "parquet",
        }
    }

    /// Whether this strategy decodes in column batches without merging
    /// transactional deltas.
    pub fn is_vectorized(self) -> bool {
        matches!(self, ReaderStrategy::ColumnarVectorized)
    }
}

impl fmt::Display for ReaderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable mapping from input format class name to strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatRegistry {
    entries: BTreeMap<String, ReaderStrategy>,
}

impl FormatRegistry {
    /// Registry with the Hive native formats.
    pub fn hive_defaults() -> Self {
        FormatRegistry::builder()
            .register(ORC_INPUT_FORMAT, ReaderStrategy::ColumnarNative)
            .register(AVRO_INPUT_FORMAT, ReaderStrategy::SelfDescribingContainer)
            .register(RCFILE_INPUT_FORMAT, ReaderStrategy::RowOrientedNative)
            .register(PARQUET_INPUT_FORMAT, ReaderStrategy::ColumnarParquet)
            .register(TEXT_INPUT_FORMAT, ReaderStrategy::DelimitedText)
            .build()
    }

    /// Start an empty registry.
    pub fn builder() -> FormatRegistryBuilder {
        FormatRegistryBuilder::default()
    }

    /// Strategy registered for `format`, if any.
    pub fn lookup(&self, format: &str) -> Option<ReaderStrategy> {
        self.entries.get(format).copied()
    }

    /// Registered `(format, strategy)` pairs, ordered by format name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ReaderStrategy)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        FormatRegistry::hive_defaults()
    }
}

/// Builder for [`FormatRegistry`].
#[derive(Debug, Default)]
pub struct FormatRegistryBuilder {
    entries: BTreeMap<String, ReaderStrategy>,
}

impl FormatRegistryBuilder {
    /// Map `format` to `strategy`; a later registration for the same format wins.
    pub fn register(mut self, format: impl Into<String>, strategy: ReaderStrategy) -> Self {
        self.entries.insert(format.into(), strategy);
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> FormatRegistry {
        FormatRegistry {
            entries: self.entries,
        }
    }
}
