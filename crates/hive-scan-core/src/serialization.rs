//! Serialization contracts (SerDe libraries) and their handles.
//!
//! A [`SerDeHandle`] pairs a SerDe class name with the property bag it was
//! initialized with. It knows how to derive the [`ObjectLayout`] rows decoded
//! through it will have. Handles are created through a [`SerdeFactory`] so
//! hosts can register additional contracts without touching the pipeline.

use std::fmt;

use snafu::prelude::*;

use crate::{
    config::JobConf,
    layout::{LayoutError, ObjectLayout},
    metadata::Properties,
};

/// Delimited text SerDe.
pub const LAZY_SIMPLE_SERDE: &str = "org.apache.hadoop.hive.serde2.lazy.LazySimpleSerDe";
/// ORC SerDe.
pub const ORC_SERDE: &str = "org.apache.hadoop.hive.ql.io.orc.OrcSerde";
/// Parquet SerDe.
pub const PARQUET_SERDE: &str = "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe";
/// Avro SerDe.
pub const AVRO_SERDE: &str = "org.apache.hadoop.hive.serde2.avro.AvroSerDe";
/// RCFile text-columnar SerDe.
pub const COLUMNAR_SERDE: &str = "org.apache.hadoop.hive.serde2.columnar.ColumnarSerDe";
/// RCFile binary-columnar SerDe.
pub const LAZY_BINARY_COLUMNAR_SERDE: &str =
    "org.apache.hadoop.hive.serde2.columnar.LazyBinaryColumnarSerDe";
/// CSV SerDe; every column is exposed as a string.
pub const OPEN_CSV_SERDE: &str = "org.apache.hadoop.hive.serde2.OpenCSVSerde";

/// Every SerDe known to [`HiveSerdeFactory`].
pub const KNOWN_SERDES: [&str; 7] = [
    LAZY_SIMPLE_SERDE,
    ORC_SERDE,
    PARQUET_SERDE,
    AVRO_SERDE,
    COLUMNAR_SERDE,
    LAZY_BINARY_COLUMNAR_SERDE,
    OPEN_CSV_SERDE,
];

/// Errors raised while creating a serialization handle.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SerdeError {
    /// The SerDe class is not registered.
    #[snafu(display("Unknown serialization library {lib}"))]
    UnknownSerde {
        /// SerDe class name.
        lib: String,
    },
}

/// How a SerDe derives its layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayoutSource {
    ColumnProperties,
    AvroLiteral,
    AllStrings,
}

impl LayoutSource {
    fn for_lib(lib: &str) -> LayoutSource {
        match lib {
            AVRO_SERDE => LayoutSource::AvroLiteral,
            OPEN_CSV_SERDE => LayoutSource::AllStrings,
            _ => LayoutSource::ColumnProperties,
        }
    }
}

/// An initialized serialization contract.
#[derive(Clone, PartialEq, Eq)]
pub struct SerDeHandle {
    lib: String,
    properties: Properties,
}

impl SerDeHandle {
    /// Handle for `lib` initialized with `properties`.
    pub fn new(lib: impl Into<String>, properties: Properties) -> Self {
        SerDeHandle {
            lib: lib.into(),
            properties,
        }
    }

    /// SerDe class name.
    pub fn lib(&self) -> &str {
        &self.lib
    }

    /// Properties the handle was initialized with.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Structural layout of rows decoded through this handle.
    pub fn object_layout(&self) -> Result<ObjectLayout, LayoutError> {
        match LayoutSource::for_lib(&self.lib) {
            LayoutSource::ColumnProperties => ObjectLayout::from_column_properties(&self.properties),
            LayoutSource::AvroLiteral => ObjectLayout::from_avro_properties(&self.properties),
            LayoutSource::AllStrings => ObjectLayout::all_strings(&self.properties),
        }
    }
}

impl fmt::Debug for SerDeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property count only.
        f.debug_struct("SerDeHandle")
            .field("lib", &self.lib)
            .field("properties", &self.properties.len())
            .finish()
    }
}

/// Creates serialization handles from a SerDe class name.
pub trait SerdeFactory: Send + Sync + fmt::Debug {
    /// Create a handle for `lib` initialized with `properties`.
    fn create(
        &self,
        job_conf: &JobConf,
        lib: &str,
        properties: &Properties,
    ) -> Result<SerDeHandle, SerdeError>;
}

/// Factory for the SerDes listed in [`KNOWN_SERDES`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HiveSerdeFactory;

impl SerdeFactory for HiveSerdeFactory {
    fn create(
        &self,
        _job_conf: &JobConf,
        lib: &str,
        properties: &Properties,
    ) -> Result<SerDeHandle, SerdeError> {
        ensure!(KNOWN_SERDES.contains(&lib), UnknownSerdeSnafu { lib });
        Ok(SerDeHandle::new(lib, properties.clone()))
    }
}
