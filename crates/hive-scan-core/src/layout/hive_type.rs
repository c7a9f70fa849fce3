//! Hive type strings (`columns.types`) and their Arrow equivalents.
//!
//! The grammar follows Hive's type-info syntax:
//!
//! ```text
//! type    := primitive | array<type> | map<type,type> | struct<name:type,...>
//! primitive := boolean | tinyint | smallint | int | bigint | float | double
//!            | string | varchar(n) | char(n) | binary | date | timestamp
//!            | decimal | decimal(p) | decimal(p,s) | void
//! list    := type ((':' | ',' | ';') type)*
//! ```
//!
//! Top-level separators only count outside `<...>` and `(...)`, so
//! `int:struct<a:int,b:string>:map<string,bigint>` is three types.
use std::{fmt, sync::Arc};

use arrow::datatypes::{DataType, Field, FieldRef, Fields, TimeUnit};
use snafu::prelude::*;

/// Default precision of an unparameterized `decimal`.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 10;

/// Maximum decimal precision Hive supports.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Errors raised while parsing or converting a Hive type string.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum HiveTypeError {
    /// The type string ended in the middle of a type.
    #[snafu(display("Unexpected end of type string {input:?}"))]
    UnexpectedEnd {
        /// Full type string being parsed.
        input: String,
    },

    /// A character that does not fit the grammar at this position.
    #[snafu(display("Unexpected {found:?} at offset {offset} in type string {input:?}"))]
    UnexpectedToken {
        /// Full type string being parsed.
        input: String,
        /// Byte offset of the offending token.
        offset: usize,
        /// The token text.
        found: String,
    },

    /// The type name is not a known Hive type.
    #[snafu(display("Unknown Hive type {name}"))]
    UnknownType {
        /// Type name as written.
        name: String,
    },

    /// The type is known but cannot be represented as an object layout.
    #[snafu(display("Hive type {name} is not supported"))]
    Unsupported {
        /// Type name as written.
        name: String,
    },

    /// Decimal parameters out of range.
    #[snafu(display("Invalid decimal({precision},{scale}): {details}"))]
    InvalidDecimal {
        /// Declared precision.
        precision: u32,
        /// Declared scale.
        scale: u32,
        /// What is wrong with them.
        details: String,
    },
}

/// Parsed Hive type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HiveType {
    /// `void`
    Void,
    /// `boolean`
    Boolean,
    /// `tinyint`
    TinyInt,
    /// `smallint`
    SmallInt,
    /// `int` / `integer`
    Int,
    /// `bigint`
    BigInt,
    /// `float`
    Float,
    /// `double` / `double precision`
    Double,
    /// `string`
    String,
    /// `varchar(n)`
    Varchar(u32),
    /// `char(n)`
    Char(u32),
    /// `binary`
    Binary,
    /// `date`
    Date,
    /// `timestamp`
    Timestamp,
    /// `decimal(p,s)`
    Decimal {
        /// Total digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// `array<T>`
    Array(Box<HiveType>),
    /// `map<K,V>`
    Map(Box<HiveType>, Box<HiveType>),
    /// `struct<name:T,...>`
    Struct(Vec<(String, HiveType)>),
}

impl HiveType {
    /// Arrow type used in object layouts.
    ///
    /// Every Hive value is nullable, so child fields are always nullable
    /// except map keys, which Arrow requires to be non-null. Struct field
    /// names are lower-cased as Hive does.
    pub fn to_arrow(&self) -> DataType {
        match self {
            HiveType::Void => DataType::Null,
            HiveType::Boolean => DataType::Boolean,
            HiveType::TinyInt => DataType::Int8,
            HiveType::SmallInt => DataType::Int16,
            HiveType::Int => DataType::Int32,
            HiveType::BigInt => DataType::Int64,
            HiveType::Float => DataType::Float32,
            HiveType::Double => DataType::Float64,
            HiveType::String | HiveType::Varchar(_) | HiveType::Char(_) => DataType::Utf8,
            HiveType::Binary => DataType::Binary,
            HiveType::Date => DataType::Date32,
            HiveType::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
            HiveType::Decimal { precision, scale } => {
                DataType::Decimal128(*precision, *scale as i8)
            }
            HiveType::Array(element) => {
                DataType::List(Arc::new(Field::new("item", element.to_arrow(), true)))
            }
            HiveType::Map(key, value) => {
                let key_field: FieldRef = Arc::new(Field::new("key", key.to_arrow(), false));
                let value_field: FieldRef = Arc::new(Field::new("value", value.to_arrow(), true));
                let entries = DataType::Struct(Fields::from(vec![key_field, value_field]));
                DataType::Map(Arc::new(Field::new("entries", entries, false)), false)
            }
            HiveType::Struct(fields) => DataType::Struct(Fields::from(
                fields
                    .iter()
                    .map(|(name, ty)| Field::new(name.to_lowercase(), ty.to_arrow(), true))
                    .collect::<Vec<_>>(),
            )),
        }
    }
}

impl fmt::Display for HiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HiveType::Void => write!(f, "void"),
            HiveType::Boolean => write!(f, "boolean"),
            HiveType::TinyInt => write!(f, "tinyint"),
            HiveType::SmallInt => write!(f, "smallint"),
            HiveType::Int => write!(f, "int"),
            HiveType::BigInt => write!(f, "bigint"),
            HiveType::Float => write!(f, "float"),
            HiveType::Double => write!(f, "double"),
            HiveType::String => write!(f, "string"),
            HiveType::Varchar(n) => write!(f, "varchar({n})"),
            HiveType::Char(n) => write!(f, "char({n})"),
            HiveType::Binary => write!(f, "binary"),
            HiveType::Date => write!(f, "date"),
            HiveType::Timestamp => write!(f, "timestamp"),
            HiveType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            HiveType::Array(e) => write!(f, "array<{e}>"),
            HiveType::Map(k, v) => write!(f, "map<{k},{v}>"),
            HiveType::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{name}:{ty}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Number(u32),
    Symbol(char),
}

struct Lexer<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Result<Self, HiveTypeError> {
        let mut tokens = Vec::new();
        let bytes = input.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c.is_ascii_whitespace() {
                i += 1;
            } else if matches!(c, '<' | '>' | '(' | ')' | ',' | ':' | ';') {
                tokens.push((i, Token::Symbol(c)));
                i += 1;
            } else if c.is_ascii_digit() {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let text = &input[start..i];
                let value = text.parse::<u32>().map_err(|_| HiveTypeError::UnexpectedToken {
                    input: input.to_string(),
                    offset: start,
                    found: text.to_string(),
                })?;
                tokens.push((start, Token::Number(value)));
            } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' || c == '`' {
                let start = i;
                while i < bytes.len() {
                    let b = bytes[i] as char;
                    if b.is_ascii_alphanumeric() || b == '_' || b == '.' || b == '$' || b == '`' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push((start, Token::Ident(&input[start..i])));
            } else {
                return UnexpectedTokenSnafu {
                    input: input.to_string(),
                    offset: i,
                    found: c.to_string(),
                }
                .fail();
            }
        }
        Ok(Lexer {
            input,
            tokens,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<(usize, Token<'a>), HiveTypeError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .context(UnexpectedEndSnafu {
                input: self.input.to_string(),
            })?;
        self.pos += 1;
        Ok(tok)
    }

    fn unexpected(&self, offset: usize, token: &Token<'_>) -> HiveTypeError {
        let found = match token {
            Token::Ident(s) => (*s).to_string(),
            Token::Number(n) => n.to_string(),
            Token::Symbol(c) => c.to_string(),
        };
        HiveTypeError::UnexpectedToken {
            input: self.input.to_string(),
            offset,
            found,
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), HiveTypeError> {
        let (offset, tok) = self.next()?;
        if tok == Token::Symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(offset, &tok))
        }
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Result<u32, HiveTypeError> {
        let (offset, tok) = self.next()?;
        match tok {
            Token::Number(n) => Ok(n),
            other => Err(self.unexpected(offset, &other)),
        }
    }

    fn field_name(&mut self) -> Result<String, HiveTypeError> {
        let (offset, tok) = self.next()?;
        match tok {
            Token::Ident(name) => Ok(name.trim_matches('`').to_string()),
            Token::Number(n) => Ok(n.to_string()),
            other => Err(self.unexpected(offset, &other)),
        }
    }

    fn parse_type(&mut self) -> Result<HiveType, HiveTypeError> {
        let (offset, tok) = self.next()?;
        let name = match tok {
            Token::Ident(name) => name,
            other => return Err(self.unexpected(offset, &other)),
        };

        let lowered = name.to_ascii_lowercase();
        Ok(match lowered.as_str() {
            "void" => HiveType::Void,
            "boolean" => HiveType::Boolean,
            "tinyint" => HiveType::TinyInt,
            "smallint" => HiveType::SmallInt,
            "int" | "integer" => HiveType::Int,
            "bigint" => HiveType::BigInt,
            "float" => HiveType::Float,
            "double" => {
                // `double precision` is an alias of `double`.
                if let Some(Token::Ident(next)) = self.peek() {
                    if next.eq_ignore_ascii_case("precision") {
                        self.pos += 1;
                    }
                }
                HiveType::Double
            }
            "string" => HiveType::String,
            "binary" => HiveType::Binary,
            "date" => HiveType::Date,
            "timestamp" => HiveType::Timestamp,
            "varchar" | "char" => {
                self.expect_symbol('(')?;
                let len = self.number()?;
                self.expect_symbol(')')?;
                if lowered == "varchar" {
                    HiveType::Varchar(len)
                } else {
                    HiveType::Char(len)
                }
            }
            "decimal" => self.parse_decimal_params()?,
            "array" => {
                self.expect_symbol('<')?;
                let element = self.parse_type()?;
                self.expect_symbol('>')?;
                HiveType::Array(Box::new(element))
            }
            "map" => {
                self.expect_symbol('<')?;
                let key = self.parse_type()?;
                self.expect_symbol(',')?;
                let value = self.parse_type()?;
                self.expect_symbol('>')?;
                HiveType::Map(Box::new(key), Box::new(value))
            }
            "struct" => {
                self.expect_symbol('<')?;
                let mut fields = Vec::new();
                if !self.eat_symbol('>') {
                    loop {
                        let field = self.field_name()?;
                        self.expect_symbol(':')?;
                        let ty = self.parse_type()?;
                        fields.push((field, ty));
                        if self.eat_symbol(',') {
                            continue;
                        }
                        self.expect_symbol('>')?;
                        break;
                    }
                }
                HiveType::Struct(fields)
            }
            "uniontype" | "interval_year_month" | "interval_day_time" | "timestamp_local_tz" => {
                return UnsupportedSnafu { name }.fail();
            }
            _ => return UnknownTypeSnafu { name }.fail(),
        })
    }

    fn parse_decimal_params(&mut self) -> Result<HiveType, HiveTypeError> {
        let (precision, scale) = if self.eat_symbol('(') {
            let precision = self.number()?;
            let scale = if self.eat_symbol(',') { self.number()? } else { 0 };
            self.expect_symbol(')')?;
            (precision, scale)
        } else {
            (u32::from(DEFAULT_DECIMAL_PRECISION), 0)
        };

        if precision == 0 || precision > u32::from(MAX_DECIMAL_PRECISION) {
            return InvalidDecimalSnafu {
                precision,
                scale,
                details: format!("precision must be between 1 and {MAX_DECIMAL_PRECISION}"),
            }
            .fail();
        }
        if scale > precision {
            return InvalidDecimalSnafu {
                precision,
                scale,
                details: "scale must be <= precision".to_string(),
            }
            .fail();
        }

        Ok(HiveType::Decimal {
            precision: precision as u8,
            scale: scale as u8,
        })
    }
}

/// Parse a single Hive type.
pub fn parse_type(input: &str) -> Result<HiveType, HiveTypeError> {
    let mut lexer = Lexer::new(input)?;
    let ty = lexer.parse_type()?;
    if let Some((offset, tok)) = lexer.tokens.get(lexer.pos) {
        return Err(lexer.unexpected(*offset, tok));
    }
    Ok(ty)
}

/// Parse a `columns.types` list. An empty or blank string yields no types.
pub fn parse_type_list(input: &str) -> Result<Vec<HiveType>, HiveTypeError> {
    let mut lexer = Lexer::new(input)?;
    let mut types = Vec::new();
    if lexer.peek().is_none() {
        return Ok(types);
    }
    loop {
        types.push(lexer.parse_type()?);
        match lexer.tokens.get(lexer.pos).cloned() {
            None => break,
            Some((_, Token::Symbol(':' | ',' | ';'))) => {
                lexer.pos += 1;
            }
            Some((offset, tok)) => return Err(lexer.unexpected(offset, &tok)),
        }
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn top_level_separators_ignore_nested_colons() -> TestResult {
        let types = parse_type_list("int:struct<a:int,b:string>:map<string,bigint>")?;
        assert_eq!(
            types,
            vec![
                HiveType::Int,
                HiveType::Struct(vec![
                    ("a".to_string(), HiveType::Int),
                    ("b".to_string(), HiveType::String),
                ]),
                HiveType::Map(Box::new(HiveType::String), Box::new(HiveType::BigInt)),
            ]
        );
        Ok(())
    }

    #[test]
    fn parameterized_primitives() -> TestResult {
        assert_eq!(parse_type("varchar(20)")?, HiveType::Varchar(20));
        assert_eq!(parse_type("CHAR(3)")?, HiveType::Char(3));
        assert_eq!(
            parse_type("decimal")?,
            HiveType::Decimal {
                precision: 10,
                scale: 0
            }
        );
        assert_eq!(
            parse_type("decimal(12, 4)")?,
            HiveType::Decimal {
                precision: 12,
                scale: 4
            }
        );
        assert_eq!(parse_type("double precision")?, HiveType::Double);
        Ok(())
    }

    #[test]
    fn invalid_decimal_is_rejected() {
        let err = parse_type("decimal(39,2)").expect_err("precision too large");
        assert!(matches!(err, HiveTypeError::InvalidDecimal { precision: 39, .. }));

        let err = parse_type("decimal(4,5)").expect_err("scale above precision");
        assert!(matches!(err, HiveTypeError::InvalidDecimal { scale: 5, .. }));
    }

    #[test]
    fn unknown_and_unsupported_types() {
        assert!(matches!(
            parse_type("uniontype<int,string>"),
            Err(HiveTypeError::Unsupported { .. })
        ));
        assert!(matches!(parse_type("blob"), Err(HiveTypeError::UnknownType { .. })));
    }

    #[test]
    fn malformed_type_strings() {
        assert!(matches!(
            parse_type("array<int"),
            Err(HiveTypeError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse_type("map<string>"),
            Err(HiveTypeError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_type_list("int string"),
            Err(HiveTypeError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn blank_type_list_is_empty() -> TestResult {
        assert!(parse_type_list("  ")?.is_empty());
        Ok(())
    }

    #[test]
    fn arrow_mapping_for_nested_types() -> TestResult {
        let ty = parse_type("map<string,array<struct<X:int>>>")?;
        let DataType::Map(entries, sorted) = ty.to_arrow() else {
            panic!("expected map");
        };
        assert!(!sorted);
        let DataType::Struct(kv) = entries.data_type() else {
            panic!("expected entries struct");
        };
        assert_eq!(kv[0].name(), "key");
        assert!(!kv[0].is_nullable());
        let DataType::List(item) = kv[1].data_type() else {
            panic!("expected list value");
        };
        let DataType::Struct(inner) = item.data_type() else {
            panic!("expected struct element");
        };
        assert_eq!(inner[0].name(), "x");
        assert_eq!(inner[0].data_type(), &DataType::Int32);
        Ok(())
    }

    #[test]
    fn display_round_trips_through_parser() -> TestResult {
        let text = "struct<a:decimal(5,2),b:array<varchar(8)>>";
        assert_eq!(parse_type(text)?.to_string(), text);
        Ok(())
    }
}
