//! Scalar values exchanged with the database.
//!
//! [`ScalarKind`] is the declared category of a record field; [`SqlValue`]
//! is a runtime value travelling to or from a driver. Both are closed sums:
//! type mapping and value coercion match on them exhaustively.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Text layout used for timestamps stored as text.
pub const TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared scalar category of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text,
    Bytes,
    Time,
}

impl ScalarKind {
    /// Returns whether the kind is a signed or unsigned integer.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    /// Returns whether the kind is a signed integer.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Returns whether the kind is an unsigned integer.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Returns whether the kind is a 64-bit integer.
    #[must_use]
    pub const fn is_wide_integer(self) -> bool {
        matches!(self, Self::I64 | Self::U64)
    }

    /// Returns the Rust spelling of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Text => "String",
            Self::Bytes => "Vec<u8>",
            Self::Time => "DateTime<Utc>",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A SQL value that can be used as a parameter or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value.
    UInt(u64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
    /// Timestamp value.
    Time(DateTime<Utc>),
}

impl SqlValue {
    /// Returns whether the value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns whether the value counts as an unset primary key.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Int(n) => *n == 0,
            Self::UInt(n) => *n == 0,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the value as an `i64` when it is an integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Returns the value as text when it is text or UTF-8 bytes.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Blob(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Describes the value for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => format!("bool {b}"),
            Self::Int(n) => format!("integer {n}"),
            Self::UInt(n) => format!("unsigned integer {n}"),
            Self::Float(f) => format!("float {f}"),
            Self::Text(s) => format!("text '{s}'"),
            Self::Blob(b) => format!("blob of {} bytes", b.len()),
            Self::Time(t) => format!("timestamp {t}"),
        }
    }
}

/// Parses a textual timestamp.
///
/// Accepts [`TIME_LAYOUT`], the same layout with fractional seconds, and
/// RFC 3339. Layouts without an offset are read as UTC.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, TIME_LAYOUT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|t| Utc.from_utc_datetime(&t))
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

/// Trait for types that can be rebuilt from a SQL value.
///
/// The input is expected in the canonical shape for the target kind, as
/// produced by a dialect's coercion; integers are range checked.
pub trait FromSqlValue: Sized {
    /// Converts a `SqlValue` into `Self`.
    fn from_sql_value(value: SqlValue) -> Result<Self>;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! signed_values {
    ($($ty:ty => $kind:ident),*) => {$(
        impl ToSqlValue for $ty {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(i64::from(self))
            }
        }

        impl FromSqlValue for $ty {
            fn from_sql_value(value: SqlValue) -> Result<Self> {
                let converted = match &value {
                    SqlValue::Int(n) => <$ty>::try_from(*n).ok(),
                    SqlValue::UInt(n) => <$ty>::try_from(*n).ok(),
                    _ => None,
                };
                converted.ok_or_else(|| Error::conversion(ScalarKind::$kind, value.describe()))
            }
        }
    )*};
}

macro_rules! unsigned_values {
    ($($ty:ty => $kind:ident),*) => {$(
        impl ToSqlValue for $ty {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::UInt(u64::from(self))
            }
        }

        impl FromSqlValue for $ty {
            fn from_sql_value(value: SqlValue) -> Result<Self> {
                let converted = match &value {
                    SqlValue::Int(n) => <$ty>::try_from(*n).ok(),
                    SqlValue::UInt(n) => <$ty>::try_from(*n).ok(),
                    _ => None,
                };
                converted.ok_or_else(|| Error::conversion(ScalarKind::$kind, value.describe()))
            }
        }
    )*};
}

signed_values!(i8 => I8, i16 => I16, i32 => I32, i64 => I64);
unsigned_values!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Time(self)
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        self.map_or(SqlValue::Null, ToSqlValue::to_sql_value)
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            other => Err(Error::conversion(ScalarKind::Bool, other.describe())),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(f),
            other => Err(Error::conversion(ScalarKind::F64, other.describe())),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(f as Self),
            other => Err(Error::conversion(ScalarKind::F32, other.describe())),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s),
            other => Err(Error::conversion(ScalarKind::Text, other.describe())),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            other => Err(Error::conversion(ScalarKind::Bytes, other.describe())),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Time(t) => Ok(t),
            other => Err(Error::conversion(ScalarKind::Time, other.describe())),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

/// Builds a `Vec<SqlValue>` from heterogeneous arguments.
///
/// ```
/// use keel_sql_core::{params, value::SqlValue};
///
/// let args = params![6, "Basic", true];
/// assert_eq!(args[1], SqlValue::Text("Basic".into()));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::value::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::value::ToSqlValue::to_sql_value($value)),+]
    };
}
