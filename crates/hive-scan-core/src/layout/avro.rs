//! Avro schema literals (`avro.schema.literal`) and their Arrow equivalents.
//!
//! Only the subset Hive's Avro SerDe can expose as columns is accepted: the
//! top-level schema must be a record, and unions must be `["null", T]`
//! (either order).
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, FieldRef, Fields, TimeUnit};
use serde_json::Value;
use snafu::prelude::*;

/// Errors raised while converting an Avro schema literal.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AvroSchemaError {
    /// The literal is not valid JSON.
    #[snafu(display("Avro schema literal is not valid JSON: {source}"))]
    InvalidJson {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The top-level schema is not a record.
    #[snafu(display("Avro schema literal must be a record, found {found}"))]
    NotARecord {
        /// What was found instead.
        found: String,
    },

    /// A schema node is malformed.
    #[snafu(display("Malformed Avro schema at {path}: {details}"))]
    Malformed {
        /// Dotted path of the offending node.
        path: String,
        /// What is wrong with it.
        details: String,
    },

    /// A schema node is valid Avro but has no column representation.
    #[snafu(display("Unsupported Avro schema at {path}: {details}"))]
    UnsupportedAvro {
        /// Dotted path of the offending node.
        path: String,
        /// What is not supported.
        details: String,
    },
}

fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

/// Column fields described by an Avro record schema literal.
pub fn record_fields(literal: &str) -> Result<Vec<FieldRef>, AvroSchemaError> {
    let value: Value = serde_json::from_str(literal).context(InvalidJsonSnafu)?;

    let is_record = value.get("type").and_then(Value::as_str) == Some("record");
    if !is_record {
        let found = match &value {
            Value::String(s) => s.clone(),
            Value::Object(obj) => obj
                .get("type")
                .map(|t| t.to_string())
                .unwrap_or_else(|| "object without type".to_string()),
            other => other.to_string(),
        };
        return NotARecordSnafu { found }.fail();
    }

    let DataType::Struct(fields) = to_arrow(&value, "")? else {
        return MalformedSnafu {
            path: "<root>",
            details: "record did not convert to a struct",
        }
        .fail();
    };
    Ok(fields
        .iter()
        .map(|f| {
            Arc::new(Field::new(
                f.name().to_lowercase(),
                f.data_type().clone(),
                true,
            ))
        })
        .collect())
}

fn to_arrow(schema: &Value, path: &str) -> Result<DataType, AvroSchemaError> {
    match schema {
        Value::String(name) => primitive(name, path),
        Value::Array(branches) => union(branches, path),
        Value::Object(obj) => {
            let ty = obj.get("type").context(MalformedSnafu {
                path: path.to_string(),
                details: "missing \"type\"",
            })?;

            if let Some(logical) = obj.get("logicalType").and_then(Value::as_str) {
                if let Some(dt) = logical_type(logical, schema, path)? {
                    return Ok(dt);
                }
            }

            match ty.as_str() {
                Some("record") => record(schema, path),
                Some("array") => {
                    let items = obj.get("items").context(MalformedSnafu {
                        path: path.to_string(),
                        details: "array without \"items\"",
                    })?;
                    let element = to_arrow(items, &join_path(path, "item"))?;
                    Ok(DataType::List(Arc::new(Field::new("item", element, true))))
                }
                Some("map") => {
                    let values = obj.get("values").context(MalformedSnafu {
                        path: path.to_string(),
                        details: "map without \"values\"",
                    })?;
                    let value = to_arrow(values, &join_path(path, "value"))?;
                    let key_field: FieldRef = Arc::new(Field::new("key", DataType::Utf8, false));
                    let value_field: FieldRef = Arc::new(Field::new("value", value, true));
                    let entries = DataType::Struct(Fields::from(vec![key_field, value_field]));
                    Ok(DataType::Map(
                        Arc::new(Field::new("entries", entries, false)),
                        false,
                    ))
                }
                Some("enum") => Ok(DataType::Utf8),
                Some("fixed") => {
                    let size = obj.get("size").and_then(Value::as_i64).context(MalformedSnafu {
                        path: path.to_string(),
                        details: "fixed without integer \"size\"",
                    })?;
                    let width = i32::try_from(size).ok().filter(|w| *w > 0).context(
                        MalformedSnafu {
                            path: path.to_string(),
                            details: format!("fixed size {size} out of range"),
                        },
                    )?;
                    Ok(DataType::FixedSizeBinary(width))
                }
                // {"type": "int"} and similar wrap a primitive or nested schema.
                _ => to_arrow(ty, path),
            }
        }
        other => MalformedSnafu {
            path: path.to_string(),
            details: format!("unexpected schema node {other}"),
        }
        .fail(),
    }
}

fn primitive(name: &str, path: &str) -> Result<DataType, AvroSchemaError> {
    Ok(match name {
        "null" => DataType::Null,
        "boolean" => DataType::Boolean,
        "int" => DataType::Int32,
        "long" => DataType::Int64,
        "float" => DataType::Float32,
        "double" => DataType::Float64,
        "bytes" => DataType::Binary,
        "string" => DataType::Utf8,
        other => {
            // Named type references are not resolved.
            return UnsupportedAvroSnafu {
                path: path.to_string(),
                details: format!("type reference {other:?}"),
            }
            .fail();
        }
    })
}

fn union(branches: &[Value], path: &str) -> Result<DataType, AvroSchemaError> {
    let non_null: Vec<&Value> = branches
        .iter()
        .filter(|b| b.as_str() != Some("null"))
        .collect();

    match non_null.as_slice() {
        [] => Ok(DataType::Null),
        [single] if non_null.len() < branches.len() || branches.len() == 1 => {
            to_arrow(single, path)
        }
        _ => UnsupportedAvroSnafu {
            path: path.to_string(),
            details: format!("union with {} non-null branches", non_null.len()),
        }
        .fail(),
    }
}

fn record(schema: &Value, path: &str) -> Result<DataType, AvroSchemaError> {
    let fields = schema
        .get("fields")
        .and_then(Value::as_array)
        .context(MalformedSnafu {
            path: path.to_string(),
            details: "record without \"fields\" array",
        })?;

    let mut out: Vec<FieldRef> = Vec::with_capacity(fields.len());
    for field in fields {
        let name = field.get("name").and_then(Value::as_str).context(MalformedSnafu {
            path: path.to_string(),
            details: "record field without \"name\"",
        })?;
        let field_path = join_path(path, name);
        let ty = field.get("type").context(MalformedSnafu {
            path: field_path.clone(),
            details: "record field without \"type\"",
        })?;
        let dt = to_arrow(ty, &field_path)?;
        out.push(Arc::new(Field::new(name.to_lowercase(), dt, true)));
    }
    Ok(DataType::Struct(Fields::from(out)))
}

fn logical_type(
    logical: &str,
    schema: &Value,
    path: &str,
) -> Result<Option<DataType>, AvroSchemaError> {
    let base = schema.get("type").and_then(Value::as_str);
    Ok(match (logical, base) {
        ("date", Some("int")) => Some(DataType::Date32),
        ("timestamp-millis", Some("long")) => {
            Some(DataType::Timestamp(TimeUnit::Millisecond, None))
        }
        ("timestamp-micros", Some("long")) => {
            Some(DataType::Timestamp(TimeUnit::Microsecond, None))
        }
        ("decimal", Some("bytes" | "fixed")) => {
            let precision = schema
                .get("precision")
                .and_then(Value::as_u64)
                .context(MalformedSnafu {
                    path: path.to_string(),
                    details: "decimal without \"precision\"",
                })?;
            let scale = schema.get("scale").and_then(Value::as_u64).unwrap_or(0);
            if precision == 0 || precision > 38 || scale > precision {
                return MalformedSnafu {
                    path: path.to_string(),
                    details: format!("invalid decimal({precision},{scale})"),
                }
                .fail();
            }
            Some(DataType::Decimal128(precision as u8, scale as i8))
        }
        // Unknown logical types fall back to the underlying type.
        _ => None,
    })
}
