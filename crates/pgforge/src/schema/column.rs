//! Column kinds, DDL fragments and structural records.
//!
//! A structural record is a JSON object `{type, nullable?, defaultTo?, ...}`
//! with the kind-specific fields listed below. It is what snapshots persist
//! and what the diff engine compares.
//!
//! | kind        | fields                              |
//! |-------------|-------------------------------------|
//! | `numeric`   | `precision?`, `scale?`              |
//! | `bit`       | `length?`, `varying`                |
//! | `char`      | `length?`                           |
//! | `varchar`   | `length?`                           |
//! | `enum`      | `values`                            |
//! | `json`      | `binary`                            |
//! | `time`      | `withTimezone`, `precision?`        |
//! | `timestamp` | `withTimezone`, `precision?`        |

use crate::migrate::naming::quote_ident;
use crate::types::value::quote_literal;
use crate::types::{SqlType, Value};
use serde_json::{Map, Value as JsonValue};

/// The closed set of column kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Smallint,
    Integer,
    Bigint,
    Serial,
    Bigserial,
    Float,
    Double,
    Numeric {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Boolean,
    Bit {
        length: Option<u32>,
        varying: bool,
    },
    Binary,
    Char {
        length: Option<u32>,
    },
    Varchar {
        length: Option<u32>,
    },
    Text,
    /// Stored as `TEXT` guarded by a named `CHECK (... IN (...))` constraint.
    Enum {
        values: Vec<String>,
    },
    Json {
        binary: bool,
    },
    Time {
        with_timezone: bool,
        precision: Option<u32>,
    },
    Date,
    Timestamp {
        with_timezone: bool,
        precision: Option<u32>,
    },
}

impl ColumnType {
    /// Discriminator used in structural records.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::Smallint => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::Bigint => "bigint",
            ColumnType::Serial => "serial",
            ColumnType::Bigserial => "bigserial",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Numeric { .. } => "numeric",
            ColumnType::Boolean => "boolean",
            ColumnType::Bit { .. } => "bit",
            ColumnType::Binary => "binary",
            ColumnType::Char { .. } => "char",
            ColumnType::Varchar { .. } => "varchar",
            ColumnType::Text => "text",
            ColumnType::Enum { .. } => "enum",
            ColumnType::Json { .. } => "json",
            ColumnType::Time { .. } => "time",
            ColumnType::Date => "date",
            ColumnType::Timestamp { .. } => "timestamp",
        }
    }

    /// Expression type of values read from this column.
    pub fn sql_type(&self) -> SqlType {
        match self {
            ColumnType::Smallint => SqlType::Smallint,
            ColumnType::Integer | ColumnType::Serial => SqlType::Integer,
            ColumnType::Bigint | ColumnType::Bigserial => SqlType::Bigint,
            ColumnType::Float => SqlType::Float,
            ColumnType::Double => SqlType::Double,
            ColumnType::Numeric { .. } => SqlType::Numeric,
            ColumnType::Boolean => SqlType::Boolean,
            ColumnType::Bit { .. } => SqlType::Bit,
            ColumnType::Binary => SqlType::Binary,
            ColumnType::Char { .. } | ColumnType::Varchar { .. } | ColumnType::Text => {
                SqlType::Text
            }
            ColumnType::Enum { .. } => SqlType::Enum,
            ColumnType::Json { .. } => SqlType::Json,
            ColumnType::Time { .. } => SqlType::Time,
            ColumnType::Date => SqlType::Date,
            ColumnType::Timestamp { .. } => SqlType::Timestamp,
        }
    }

    /// `SERIAL` and `BIGSERIAL`: an integer column fed by an owned sequence.
    pub fn is_serial(&self) -> bool {
        matches!(self, ColumnType::Serial | ColumnType::Bigserial)
    }

    /// The type the column is stored as. Serial kinds are shorthands valid
    /// only in CREATE TABLE and ADD COLUMN; `ALTER ... TYPE` needs this form.
    pub fn storage_type(&self) -> String {
        match self {
            ColumnType::Serial => "INT".to_string(),
            ColumnType::Bigserial => "BIGINT".to_string(),
            other => other.ddl_type(),
        }
    }

    /// DDL type fragment, e.g. `VARCHAR(64)` or `TIMESTAMP(3) WITH TIME ZONE`.
    pub fn ddl_type(&self) -> String {
        fn sized(base: &str, n: Option<u32>) -> String {
            match n {
                Some(n) => format!("{base}({n})"),
                None => base.to_string(),
            }
        }
        fn zoned(base: &str, precision: Option<u32>, with_timezone: bool) -> String {
            let mut s = sized(base, precision);
            if with_timezone {
                s.push_str(" WITH TIME ZONE");
            }
            s
        }

        match self {
            ColumnType::Smallint => "SMALLINT".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::Bigint => "BIGINT".to_string(),
            ColumnType::Serial => "SERIAL".to_string(),
            ColumnType::Bigserial => "BIGSERIAL".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("NUMERIC({p}, {s})"),
                (Some(p), None) => format!("NUMERIC({p})"),
                (None, _) => "NUMERIC".to_string(),
            },
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Bit { length, varying } => {
                sized(if *varying { "VARBIT" } else { "BIT" }, *length)
            }
            ColumnType::Binary => "BYTEA".to_string(),
            ColumnType::Char { length } => sized("CHAR", *length),
            ColumnType::Varchar { length } => sized("VARCHAR", *length),
            ColumnType::Text | ColumnType::Enum { .. } => "TEXT".to_string(),
            ColumnType::Json { binary } => {
                if *binary { "JSONB" } else { "JSON" }.to_string()
            }
            ColumnType::Time {
                with_timezone,
                precision,
            } => zoned("TIME", *precision, *with_timezone),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp {
                with_timezone,
                precision,
            } => zoned("TIMESTAMP", *precision, *with_timezone),
        }
    }

    fn write_attributes(&self, map: &mut Map<String, JsonValue>) {
        match self {
            ColumnType::Numeric { precision, scale } => {
                put_opt(map, "precision", *precision);
                put_opt(map, "scale", *scale);
            }
            ColumnType::Bit { length, varying } => {
                put_opt(map, "length", *length);
                map.insert("varying".into(), JsonValue::Bool(*varying));
            }
            ColumnType::Char { length } | ColumnType::Varchar { length } => {
                put_opt(map, "length", *length);
            }
            ColumnType::Enum { values } => {
                let values = values.iter().cloned().map(JsonValue::String).collect();
                map.insert("values".into(), JsonValue::Array(values));
            }
            ColumnType::Json { binary } => {
                map.insert("binary".into(), JsonValue::Bool(*binary));
            }
            ColumnType::Time {
                with_timezone,
                precision,
            }
            | ColumnType::Timestamp {
                with_timezone,
                precision,
            } => {
                map.insert("withTimezone".into(), JsonValue::Bool(*with_timezone));
                put_opt(map, "precision", *precision);
            }
            _ => {}
        }
    }
}

fn put_opt(map: &mut Map<String, JsonValue>, key: &str, value: Option<u32>) {
    if let Some(v) = value {
        map.insert(key.into(), JsonValue::from(v));
    }
}

/// A column declaration: kind plus shared attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub ty: ColumnType,
    /// `None` leaves nullability unstated in DDL.
    pub nullable: Option<bool>,
    /// Raw SQL default expression.
    pub default_to: Option<String>,
}

macro_rules! simple_kinds {
    ($($fn_name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $fn_name() -> Self {
                Self::new(ColumnType::$kind)
            }
        )*
    };
}

impl Column {
    pub fn new(ty: ColumnType) -> Self {
        Self {
            ty,
            nullable: None,
            default_to: None,
        }
    }

    simple_kinds! {
        smallint => Smallint,
        integer => Integer,
        bigint => Bigint,
        serial => Serial,
        bigserial => Bigserial,
        float => Float,
        double => Double,
        boolean => Boolean,
        binary => Binary,
        text => Text,
        date => Date,
    }

    pub fn numeric(precision: Option<u32>, scale: Option<u32>) -> Self {
        Self::new(ColumnType::Numeric { precision, scale })
    }

    pub fn bit(length: Option<u32>) -> Self {
        Self::new(ColumnType::Bit {
            length,
            varying: false,
        })
    }

    pub fn varbit(length: Option<u32>) -> Self {
        Self::new(ColumnType::Bit {
            length,
            varying: true,
        })
    }

    pub fn char(length: Option<u32>) -> Self {
        Self::new(ColumnType::Char { length })
    }

    pub fn varchar(length: Option<u32>) -> Self {
        Self::new(ColumnType::Varchar { length })
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ColumnType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn json() -> Self {
        Self::new(ColumnType::Json { binary: false })
    }

    pub fn jsonb() -> Self {
        Self::new(ColumnType::Json { binary: true })
    }

    pub fn time(with_timezone: bool, precision: Option<u32>) -> Self {
        Self::new(ColumnType::Time {
            with_timezone,
            precision,
        })
    }

    pub fn timestamp(with_timezone: bool, precision: Option<u32>) -> Self {
        Self::new(ColumnType::Timestamp {
            with_timezone,
            precision,
        })
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = Some(true);
        self
    }

    /// Default from a raw SQL expression such as `now()`.
    pub fn default_raw(mut self, sql: impl Into<String>) -> Self {
        self.default_to = Some(sql.into());
        self
    }

    /// Default from a value, rendered as a SQL literal.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_to = Some(value.into().to_sql_literal());
        self
    }

    pub fn is_not_null(&self) -> bool {
        self.nullable == Some(false)
    }

    /// Full column DDL: `"name" TYPE [NOT NULL|NULL] [DEFAULT expr]`.
    pub fn ddl(&self, name: &str) -> String {
        let mut sql = format!("{} {}", quote_ident(name), self.ty.ddl_type());
        match self.nullable {
            Some(false) => sql.push_str(" NOT NULL"),
            Some(true) => sql.push_str(" NULL"),
            None => {}
        }
        if let Some(default) = &self.default_to {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    /// `CHECK ("name" IN (...))` for enum columns.
    pub fn check_clause(&self, name: &str) -> Option<String> {
        match &self.ty {
            ColumnType::Enum { values } => {
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                Some(format!(
                    "CHECK ({} IN ({}))",
                    quote_ident(name),
                    values.join(", ")
                ))
            }
            _ => None,
        }
    }

    /// Structural record for snapshots and diffing.
    pub fn serialize(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert("type".into(), JsonValue::String(self.ty.tag().to_string()));
        if let Some(nullable) = self.nullable {
            map.insert("nullable".into(), JsonValue::Bool(nullable));
        }
        if let Some(default) = &self.default_to {
            map.insert("defaultTo".into(), JsonValue::String(default.clone()));
        }
        self.ty.write_attributes(&mut map);
        JsonValue::Object(map)
    }

    /// Rebuild a column from its structural record.
    ///
    /// Each registered kind validates the record in registration order; the
    /// first match wins. Returns `None` when no kind accepts the record.
    pub fn deserialize(record: &JsonValue) -> Option<Column> {
        let map = record.as_object()?;
        let nullable = match map.get("nullable") {
            None => None,
            Some(v) => Some(v.as_bool()?),
        };
        let default_to = match map.get("defaultTo") {
            None => None,
            Some(v) => Some(v.as_str()?.to_string()),
        };
        let ty = REGISTRY
            .iter()
            .find_map(|(tag, validate)| match map.get("type") {
                Some(JsonValue::String(t)) if t == tag => validate(map),
                _ => None,
            })?;
        Some(Column {
            ty,
            nullable,
            default_to,
        })
    }
}

// ==================== Registry ====================

type Validator = fn(&Map<String, JsonValue>) -> Option<ColumnType>;

const COMMON_FIELDS: [&str; 3] = ["type", "nullable", "defaultTo"];

/// Registered kinds, in validation order.
const REGISTRY: &[(&str, Validator)] = &[
    ("smallint", |m| plain(m, ColumnType::Smallint)),
    ("integer", |m| plain(m, ColumnType::Integer)),
    ("bigint", |m| plain(m, ColumnType::Bigint)),
    ("serial", |m| plain(m, ColumnType::Serial)),
    ("bigserial", |m| plain(m, ColumnType::Bigserial)),
    ("float", |m| plain(m, ColumnType::Float)),
    ("double", |m| plain(m, ColumnType::Double)),
    ("numeric", numeric),
    ("boolean", |m| plain(m, ColumnType::Boolean)),
    ("bit", bit),
    ("binary", |m| plain(m, ColumnType::Binary)),
    ("char", char_kind),
    ("varchar", varchar_kind),
    ("text", |m| plain(m, ColumnType::Text)),
    ("enum", enum_kind),
    ("json", json_kind),
    ("time", time_kind),
    ("date", |m| plain(m, ColumnType::Date)),
    ("timestamp", timestamp_kind),
];

/// Reject records carrying fields the kind does not define.
fn only_fields(map: &Map<String, JsonValue>, extra: &[&str]) -> Option<()> {
    map.keys()
        .all(|k| COMMON_FIELDS.contains(&k.as_str()) || extra.contains(&k.as_str()))
        .then_some(())
}

/// Absent → `Some(None)`; a `u32` → `Some(Some(n))`; anything else → `None`.
fn opt_u32(map: &Map<String, JsonValue>, key: &str) -> Option<Option<u32>> {
    match map.get(key) {
        None => Some(None),
        Some(v) => Some(Some(u32::try_from(v.as_u64()?).ok()?)),
    }
}

fn req_bool(map: &Map<String, JsonValue>, key: &str) -> Option<bool> {
    map.get(key)?.as_bool()
}

fn plain(map: &Map<String, JsonValue>, ty: ColumnType) -> Option<ColumnType> {
    only_fields(map, &[])?;
    Some(ty)
}

fn numeric(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["precision", "scale"])?;
    Some(ColumnType::Numeric {
        precision: opt_u32(map, "precision")?,
        scale: opt_u32(map, "scale")?,
    })
}

fn bit(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["length", "varying"])?;
    Some(ColumnType::Bit {
        length: opt_u32(map, "length")?,
        varying: req_bool(map, "varying")?,
    })
}

fn char_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["length"])?;
    Some(ColumnType::Char {
        length: opt_u32(map, "length")?,
    })
}

fn varchar_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["length"])?;
    Some(ColumnType::Varchar {
        length: opt_u32(map, "length")?,
    })
}

fn enum_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["values"])?;
    let values = map
        .get("values")?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    if values.is_empty() {
        return None;
    }
    Some(ColumnType::Enum { values })
}

fn json_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["binary"])?;
    Some(ColumnType::Json {
        binary: req_bool(map, "binary")?,
    })
}

fn time_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["withTimezone", "precision"])?;
    Some(ColumnType::Time {
        with_timezone: req_bool(map, "withTimezone")?,
        precision: opt_u32(map, "precision")?,
    })
}

fn timestamp_kind(map: &Map<String, JsonValue>) -> Option<ColumnType> {
    only_fields(map, &["withTimezone", "precision"])?;
    Some(ColumnType::Timestamp {
        with_timezone: req_bool(map, "withTimezone")?,
        precision: opt_u32(map, "precision")?,
    })
}
