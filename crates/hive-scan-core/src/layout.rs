//! Object layouts: the structural schema a serialization handle exposes.
//!
//! A layout is derived from the handle's properties:
//! - `columns` (split on `column.name.delimiter`, default `,`) and
//!   `columns.types` (see [`hive_type`]) for most SerDes;
//! - `avro.schema.literal` for the Avro SerDe, falling back to the column
//!   properties when no literal is present;
//! - `columns` alone for text SerDes that expose every column as a string.
//!
//! Two layouts are compared structurally. A partition whose layout differs
//! from the table's is *drifted*, which disables vectorized ORC decoding for
//! that split.
pub mod avro;
pub mod hive_type;

use std::{fmt, sync::Arc};

use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use snafu::prelude::*;

use crate::metadata::Properties;

pub use avro::AvroSchemaError;
pub use hive_type::{HiveType, HiveTypeError};

/// Property listing column names.
pub const COLUMNS_KEY: &str = "columns";

/// Property listing column types.
pub const COLUMN_TYPES_KEY: &str = "columns.types";

/// Property overriding the column name delimiter.
pub const COLUMN_NAME_DELIMITER_KEY: &str = "column.name.delimiter";

/// Property carrying an inline Avro schema.
pub const AVRO_SCHEMA_LITERAL_KEY: &str = "avro.schema.literal";

/// Errors raised while deriving an [`ObjectLayout`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LayoutError {
    /// `columns.types` could not be parsed.
    #[snafu(display("Invalid {COLUMN_TYPES_KEY}: {source}"))]
    ColumnTypes {
        /// Underlying parse error.
        source: HiveTypeError,
    },

    /// Column names and types do not line up.
    #[snafu(display("{COLUMNS_KEY} lists {names} columns but {COLUMN_TYPES_KEY} lists {types}"))]
    ColumnCountMismatch {
        /// Number of names.
        names: usize,
        /// Number of types.
        types: usize,
    },

    /// Types were given without names.
    #[snafu(display("{COLUMN_TYPES_KEY} is set but {COLUMNS_KEY} is missing"))]
    MissingColumnNames,

    /// The same column name appears twice.
    #[snafu(display("Duplicate column name {name}"))]
    DuplicateColumn {
        /// Lower-cased column name.
        name: String,
    },

    /// The Avro schema literal could not be converted.
    #[snafu(display("Invalid {AVRO_SCHEMA_LITERAL_KEY}: {source}"))]
    AvroLiteral {
        /// Underlying conversion error.
        source: AvroSchemaError,
    },
}

/// Structural schema of rows decoded through a serialization handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLayout {
    schema: SchemaRef,
}

impl ObjectLayout {
    /// Wrap an Arrow schema.
    pub fn new(schema: SchemaRef) -> Self {
        ObjectLayout { schema }
    }

    /// Layout with no columns.
    pub fn empty() -> Self {
        ObjectLayout::new(Arc::new(Schema::empty()))
    }

    /// Layout from `columns` + `columns.types`.
    pub fn from_column_properties(properties: &Properties) -> Result<Self, LayoutError> {
        let names = column_names(properties);
        let types = match properties.get(COLUMN_TYPES_KEY) {
            Some(raw) => hive_type::parse_type_list(raw).context(ColumnTypesSnafu)?,
            None => Vec::new(),
        };

        if names.is_empty() && !types.is_empty() {
            return MissingColumnNamesSnafu.fail();
        }
        // Column names without any types: Hive treats every column as a string.
        let types = if types.is_empty() {
            vec![HiveType::String; names.len()]
        } else {
            types
        };
        ensure!(
            names.len() == types.len(),
            ColumnCountMismatchSnafu {
                names: names.len(),
                types: types.len(),
            }
        );

        let fields = names
            .into_iter()
            .zip(types)
            .map(|(name, ty)| Arc::new(Field::new(name, ty.to_arrow(), true)))
            .collect();
        ObjectLayout::from_fields(fields)
    }

    /// Layout from `columns` with every column typed as a string.
    pub fn all_strings(properties: &Properties) -> Result<Self, LayoutError> {
        let fields = column_names(properties)
            .into_iter()
            .map(|name| Arc::new(Field::new(name, DataType::Utf8, true)))
            .collect();
        ObjectLayout::from_fields(fields)
    }

    /// Layout from `avro.schema.literal`, or from the column properties when
    /// no literal is set.
    pub fn from_avro_properties(properties: &Properties) -> Result<Self, LayoutError> {
        match properties.get(AVRO_SCHEMA_LITERAL_KEY) {
            Some(literal) => {
                let fields = avro::record_fields(literal).context(AvroLiteralSnafu)?;
                ObjectLayout::from_fields(fields)
            }
            None => ObjectLayout::from_column_properties(properties),
        }
    }

    fn from_fields(fields: Vec<FieldRef>) -> Result<Self, LayoutError> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name().clone()) {
                return DuplicateColumnSnafu {
                    name: field.name().clone(),
                }
                .fail();
            }
        }
        Ok(ObjectLayout::new(Arc::new(Schema::new(fields))))
    }

    /// The Arrow schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.schema.fields().iter().map(|f| f.name().as_str())
    }

    /// Whether this layout differs structurally from `other`.
    pub fn drifts_from(&self, other: &ObjectLayout) -> bool {
        self != other
    }
}

impl fmt::Display for ObjectLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct<")?;
        for (i, field) in self.schema.fields().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name(), field.data_type())?;
        }
        write!(f, ">")
    }
}

fn column_names(properties: &Properties) -> Vec<String> {
    let Some(raw) = properties.get(COLUMNS_KEY) else {
        return Vec::new();
    };
    let delimiter = properties
        .get(COLUMN_NAME_DELIMITER_KEY)
        .map(String::as_str)
        .filter(|d| !d.is_empty())
        .unwrap_or(",");
    raw.split(delimiter)
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}
