//! Runtime literal values.
//!
//! [`Value`] is what constant leaves and named parameters carry. It implements
//! [`ToSql`] by converting to whatever parameter type the server declared, and
//! [`decode`] maps a returned column back into a `Value` through the decoder
//! registered for the column's [`SqlType`].

use crate::error::{ForgeError, ForgeResult};
use crate::types::tag::SqlType;
use bit_vec::BitVec;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};

/// A runtime SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Bits(BitVec),
    Json(serde_json::Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short variant name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Bits(_) => "bits",
            Value::Json(_) => "json",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
        }
    }

    /// Convert this value into the representation used for `ty`.
    ///
    /// Strings bound to temporal tags are parsed here, so a malformed date
    /// surfaces as [`ForgeError::MalformedLiteral`] at construction time.
    pub fn coerce_to(&self, ty: SqlType) -> ForgeResult<Value> {
        match (ty, self) {
            (_, Value::Null) => Ok(Value::Null),
            (SqlType::Date, Value::Text(s)) => parse_date(s).map(Value::Date),
            (SqlType::Time, Value::Text(s)) => parse_time(s).map(Value::Time),
            (SqlType::Timestamp, Value::Text(s)) => parse_timestamp(s),
            (SqlType::Timestamp, Value::Date(d)) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
            _ if ty.accepts(self) => Ok(self.clone()),
            _ => Err(ForgeError::type_mismatch(ty.name(), self.kind_name())),
        }
    }

    /// Render as an inline SQL literal (used for column defaults).
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) if v.is_nan() => "'NaN'".to_string(),
            Value::Float(v) if v.is_infinite() => {
                if *v > 0.0 {
                    "'Infinity'".to_string()
                } else {
                    "'-Infinity'".to_string()
                }
            }
            Value::Float(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Text(s) => quote_literal(s),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("'\\x{hex}'")
            }
            Value::Bits(bits) => {
                let digits: String = bits.iter().map(|b| if b { '1' } else { '0' }).collect();
                format!("B'{digits}'")
            }
            Value::Json(v) => quote_literal(&v.to_string()),
            Value::Date(d) => quote_literal(&d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => quote_literal(&t.format("%H:%M:%S%.f").to_string()),
            Value::Timestamp(ts) => quote_literal(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::TimestampTz(ts) => quote_literal(&ts.to_rfc3339()),
        }
    }
}

/// Quote a string as a SQL literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Parse `YYYY-MM-DD`; the string must split into exactly three numeric parts.
pub fn parse_date(s: &str) -> ForgeResult<NaiveDate> {
    let parts: Vec<&str> = s.trim().split('-').collect();
    if parts.len() != 3 {
        return Err(ForgeError::malformed(
            s,
            format!("expected 3 date components, found {}", parts.len()),
        ));
    }
    let year: i32 = parts[0]
        .parse()
        .map_err(|_| ForgeError::malformed(s, "year is not numeric"))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| ForgeError::malformed(s, "month is not numeric"))?;
    let day: u32 = parts[2]
        .parse()
        .map_err(|_| ForgeError::malformed(s, "day is not numeric"))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ForgeError::malformed(s, "not a calendar date"))
}

fn parse_time(s: &str) -> ForgeResult<NaiveTime> {
    let t = s.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .map_err(|e| ForgeError::malformed(s, e.to_string()))
}

fn parse_timestamp(s: &str) -> ForgeResult<Value> {
    let t = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(t) {
        return Ok(Value::TimestampTz(ts.with_timezone(&Utc)));
    }
    if let Ok(ts) = DateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(Value::TimestampTz(ts.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(Value::Timestamp(ts));
        }
    }
    parse_date(t).map(|d| Value::Timestamp(d.and_time(NaiveTime::MIN)))
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql(ty, out)
                } else if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql(ty, out)
                } else if *ty == Type::NUMERIC {
                    Decimal::from(*v).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else if *ty == Type::NUMERIC {
                    Decimal::try_from(*v)?.to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Text(s) => {
                if matches!(ty.kind(), Kind::Enum(_)) || !<&str as ToSql>::accepts(ty) {
                    out.extend_from_slice(s.as_bytes());
                    Ok(IsNull::No)
                } else {
                    s.as_str().to_sql(ty, out)
                }
            }
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
            Value::Bits(b) => b.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Date(d) => {
                if *ty == Type::TIMESTAMP {
                    d.and_time(NaiveTime::MIN).to_sql(ty, out)
                } else {
                    d.to_sql(ty, out)
                }
            }
            Value::Time(t) => t.to_sql(ty, out),
            Value::Timestamp(ts) => {
                if *ty == Type::TIMESTAMPTZ {
                    Utc.from_utc_datetime(ts).to_sql(ty, out)
                } else {
                    ts.to_sql(ty, out)
                }
            }
            Value::TimestampTz(ts) => {
                if *ty == Type::TIMESTAMP {
                    ts.naive_utc().to_sql(ty, out)
                } else {
                    ts.to_sql(ty, out)
                }
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    BitVec => Bits,
    serde_json::Value => Json,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ==================== Column decoders ====================

struct IntDecoder(i64);

impl<'a> FromSql<'a> for IntDecoder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        match *ty {
            Type::INT2 => Ok(Self(i16::from_sql(ty, raw)?.into())),
            Type::INT4 => Ok(Self(i32::from_sql(ty, raw)?.into())),
            _ => Ok(Self(i64::from_sql(ty, raw)?)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::INT2 | Type::INT4 | Type::INT8)
    }
}

struct FloatDecoder(f64);

impl<'a> FromSql<'a> for FloatDecoder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        match *ty {
            Type::FLOAT4 => Ok(Self(f32::from_sql(ty, raw)?.into())),
            _ => Ok(Self(f64::from_sql(ty, raw)?)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::FLOAT4 | Type::FLOAT8)
    }
}

struct LabelDecoder(String);

impl<'a> FromSql<'a> for LabelDecoder {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self(std::str::from_utf8(raw)?.to_owned()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_)) || <&str as FromSql>::accepts(ty)
    }
}

enum TimestampDecoder {
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl<'a> FromSql<'a> for TimestampDecoder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        match *ty {
            Type::TIMESTAMPTZ => Ok(Self::Utc(DateTime::<Utc>::from_sql(ty, raw)?)),
            _ => Ok(Self::Naive(NaiveDateTime::from_sql(ty, raw)?)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::TIMESTAMP | Type::TIMESTAMPTZ)
    }
}

/// Decode column `idx` of `row` through the decoder registered for `ty`.
pub fn decode(row: &Row, idx: usize, ty: SqlType) -> ForgeResult<Value> {
    fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> ForgeResult<Option<T>> {
        row.try_get::<_, Option<T>>(idx).map_err(|e| {
            let column = row
                .columns()
                .get(idx)
                .map_or_else(|| idx.to_string(), |c| c.name().to_string());
            ForgeError::decode(column, e.to_string())
        })
    }

    let value = match ty {
        SqlType::Smallint | SqlType::Integer | SqlType::Bigint => {
            get::<IntDecoder>(row, idx)?.map(|v| Value::Int(v.0))
        }
        SqlType::Float | SqlType::Double => get::<FloatDecoder>(row, idx)?.map(|v| Value::Float(v.0)),
        SqlType::Numeric => get::<Decimal>(row, idx)?.map(Value::Decimal),
        SqlType::Boolean => get::<bool>(row, idx)?.map(Value::Bool),
        SqlType::Bit => get::<BitVec>(row, idx)?.map(Value::Bits),
        SqlType::Binary => get::<Vec<u8>>(row, idx)?.map(Value::Bytes),
        SqlType::Text => get::<String>(row, idx)?.map(Value::Text),
        SqlType::Enum => get::<LabelDecoder>(row, idx)?.map(|v| Value::Text(v.0)),
        SqlType::Json => get::<serde_json::Value>(row, idx)?.map(Value::Json),
        SqlType::Time => get::<NaiveTime>(row, idx)?.map(Value::Time),
        SqlType::Date => get::<NaiveDate>(row, idx)?.map(Value::Date),
        SqlType::Timestamp => get::<TimestampDecoder>(row, idx)?.map(|v| match v {
            TimestampDecoder::Naive(ts) => Value::Timestamp(ts),
            TimestampDecoder::Utc(ts) => Value::TimestampTz(ts),
        }),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_must_have_three_numeric_components() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );

        let err = parse_date("2024-02").unwrap_err();
        assert!(matches!(err, ForgeError::MalformedLiteral { .. }));

        let err = parse_date("2024-ab-01").unwrap_err();
        assert!(matches!(err, ForgeError::MalformedLiteral { .. }));

        let err = parse_date("2023-02-29").unwrap_err();
        assert!(err.to_string().contains("not a calendar date"));
    }

    #[test]
    fn coerce_parses_temporal_strings() {
        let v = Value::from("2024-01-02").coerce_to(SqlType::Timestamp).unwrap();
        assert_eq!(
            v,
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_time(NaiveTime::MIN)
            )
        );

        let v = Value::from("2024-01-02T03:04:05Z")
            .coerce_to(SqlType::Timestamp)
            .unwrap();
        assert!(matches!(v, Value::TimestampTz(_)));

        let v = Value::from("12:30").coerce_to(SqlType::Time).unwrap();
        assert_eq!(v, Value::Time(NaiveTime::from_hms_opt(12, 30, 0).unwrap()));
    }

    #[test]
    fn coerce_rejects_mismatched_values() {
        let err = Value::from(true).coerce_to(SqlType::Integer).unwrap_err();
        assert!(matches!(err, ForgeError::TypeMismatch { .. }));

        let err = Value::from("tomorrow").coerce_to(SqlType::Date).unwrap_err();
        assert!(matches!(err, ForgeError::MalformedLiteral { .. }));
    }

    #[test]
    fn sql_literals() {
        assert_eq!(Value::from("it's").to_sql_literal(), "'it''s'");
        assert_eq!(Value::from(42).to_sql_literal(), "42");
        assert_eq!(Value::from(false).to_sql_literal(), "FALSE");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::from(vec![0xde_u8, 0xad]).to_sql_literal(), "'\\xdead'");
        assert_eq!(
            Value::from(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()).to_sql_literal(),
            "'2020-05-01'"
        );
        let mut bits = BitVec::from_elem(3, false);
        bits.set(0, true);
        assert_eq!(Value::from(bits).to_sql_literal(), "B'100'");
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(7_i32)), Value::Int(7));
    }
}
