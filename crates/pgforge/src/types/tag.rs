//! SQL type tags and type groups.

use crate::types::value::Value;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// The closed set of SQL types an expression can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlType {
    Smallint,
    Integer,
    Bigint,
    Float,
    Double,
    Numeric,
    Boolean,
    Bit,
    Binary,
    Text,
    Enum,
    Json,
    Time,
    Date,
    Timestamp,
}

/// Comparison compatibility class of a [`SqlType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeGroup {
    Numeric,
    Boolean,
    Bit,
    Binary,
    Text,
    Enum,
    Json,
    Time,
    Timestamp,
}

impl SqlType {
    /// Every tag, in declaration order.
    pub const ALL: [SqlType; 15] = [
        SqlType::Smallint,
        SqlType::Integer,
        SqlType::Bigint,
        SqlType::Float,
        SqlType::Double,
        SqlType::Numeric,
        SqlType::Boolean,
        SqlType::Bit,
        SqlType::Binary,
        SqlType::Text,
        SqlType::Enum,
        SqlType::Json,
        SqlType::Time,
        SqlType::Date,
        SqlType::Timestamp,
    ];

    /// Tags admissible in arithmetic.
    pub const NUMERIC: [SqlType; 6] = [
        SqlType::Smallint,
        SqlType::Integer,
        SqlType::Bigint,
        SqlType::Float,
        SqlType::Double,
        SqlType::Numeric,
    ];

    /// Tags admissible in bitwise operators.
    pub const BITWISE: [SqlType; 4] = [
        SqlType::Smallint,
        SqlType::Integer,
        SqlType::Bigint,
        SqlType::Bit,
    ];

    /// Tags admissible in pattern matching and concatenation.
    pub const TEXTUAL: [SqlType; 2] = [SqlType::Text, SqlType::Enum];

    /// The comparison group this tag belongs to.
    pub fn group(self) -> TypeGroup {
        match self {
            SqlType::Smallint
            | SqlType::Integer
            | SqlType::Bigint
            | SqlType::Float
            | SqlType::Double
            | SqlType::Numeric => TypeGroup::Numeric,
            SqlType::Boolean => TypeGroup::Boolean,
            SqlType::Bit => TypeGroup::Bit,
            SqlType::Binary => TypeGroup::Binary,
            SqlType::Text => TypeGroup::Text,
            SqlType::Enum => TypeGroup::Enum,
            SqlType::Json => TypeGroup::Json,
            SqlType::Time => TypeGroup::Time,
            SqlType::Date | SqlType::Timestamp => TypeGroup::Timestamp,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.group() == TypeGroup::Numeric
    }

    /// Lowercase tag name, as used in structural records and messages.
    pub fn name(self) -> &'static str {
        match self {
            SqlType::Smallint => "smallint",
            SqlType::Integer => "integer",
            SqlType::Bigint => "bigint",
            SqlType::Float => "float",
            SqlType::Double => "double",
            SqlType::Numeric => "numeric",
            SqlType::Boolean => "boolean",
            SqlType::Bit => "bit",
            SqlType::Binary => "binary",
            SqlType::Text => "text",
            SqlType::Enum => "enum",
            SqlType::Json => "json",
            SqlType::Time => "time",
            SqlType::Date => "date",
            SqlType::Timestamp => "timestamp",
        }
    }

    /// PostgreSQL type used to cast bound parameters of this tag.
    ///
    /// Enum values are left uncast; the server infers the concrete enum or
    /// text type from the surrounding expression.
    pub fn pg_cast(self) -> Option<&'static str> {
        match self {
            SqlType::Smallint => Some("smallint"),
            SqlType::Integer => Some("integer"),
            SqlType::Bigint => Some("bigint"),
            SqlType::Float => Some("real"),
            SqlType::Double => Some("double precision"),
            SqlType::Numeric => Some("numeric"),
            SqlType::Boolean => Some("boolean"),
            SqlType::Bit => Some("varbit"),
            SqlType::Binary => Some("bytea"),
            SqlType::Text => Some("text"),
            SqlType::Enum => None,
            SqlType::Json => Some("jsonb"),
            SqlType::Time => Some("time"),
            SqlType::Date => Some("date"),
            SqlType::Timestamp => Some("timestamp"),
        }
    }

    /// Runtime predicate: can `value` be bound as this tag?
    ///
    /// `NULL` is accepted by every tag.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (SqlType::Smallint, Value::Int(v)) => i16::try_from(*v).is_ok(),
            (SqlType::Integer, Value::Int(v)) => i32::try_from(*v).is_ok(),
            (SqlType::Bigint, Value::Int(_)) => true,
            (SqlType::Float | SqlType::Double, Value::Int(_) | Value::Float(_)) => true,
            (SqlType::Numeric, Value::Int(_) | Value::Decimal(_)) => true,
            (SqlType::Numeric, Value::Float(v)) => v.is_finite(),
            (SqlType::Boolean, Value::Bool(_)) => true,
            (SqlType::Bit, Value::Bits(_)) => true,
            (SqlType::Binary, Value::Bytes(_)) => true,
            (SqlType::Text | SqlType::Enum, Value::Text(_)) => true,
            (SqlType::Json, Value::Json(_)) => true,
            (SqlType::Time, Value::Time(_)) => true,
            (SqlType::Time, Value::Text(s)) => time_like().is_match(s),
            (SqlType::Date, Value::Date(_)) => true,
            (SqlType::Date, Value::Text(s)) => date_like().is_match(s),
            (SqlType::Timestamp, Value::Date(_) | Value::Timestamp(_) | Value::TimestampTz(_)) => {
                true
            }
            (SqlType::Timestamp, Value::Text(s)) => {
                timestamp_like().is_match(s) || date_like().is_match(s)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn date_like() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| {
        Regex::new(r"^\s*\d{1,6}-\d{1,2}-\d{1,2}\s*$").expect("invalid built-in date regex")
    })
}

fn time_like() -> &'static Regex {
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    TIME_RE.get_or_init(|| {
        Regex::new(r"^\s*\d{1,2}:\d{2}(:\d{2}(\.\d{1,9})?)?\s*$")
            .expect("invalid built-in time regex")
    })
}

fn timestamp_like() -> &'static Regex {
    static TIMESTAMP_RE: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP_RE.get_or_init(|| {
        Regex::new(
            r"^\s*\d{1,6}-\d{1,2}-\d{1,2}[ T]\d{1,2}:\d{2}(:\d{2}(\.\d{1,9})?)?(Z|[+-]\d{2}(:?\d{2})?)?\s*$",
        )
        .expect("invalid built-in timestamp regex")
    })
}

/// Widen two numeric tags to the type their arithmetic produces.
///
/// `float op float` stays `float`, but `float` mixed with anything else
/// widens to `double`.
pub fn find_largest_numeric(a: SqlType, b: SqlType) -> SqlType {
    use SqlType::*;
    if a == Float && b == Float {
        Float
    } else if matches!(a, Double | Float) || matches!(b, Double | Float) {
        Double
    } else if a == Numeric || b == Numeric {
        Numeric
    } else if a == Bigint || b == Bigint {
        Bigint
    } else if a == Integer || b == Integer {
        Integer
    } else {
        Smallint
    }
}
