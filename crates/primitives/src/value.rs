use crate::datetime::{datetime_to_serial, serial_to_datetime};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Error literals a cell can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorValue {
    Div0,  // #DIV/0!
    Name,  // #NAME?
    Value, // #VALUE!
    Ref,   // #REF!
    Null,  // #NULL!
    Num,   // #NUM!
    NA,    // #N/A
}

impl ErrorValue {
    pub const ALL: [ErrorValue; 7] = [
        Self::Div0,
        Self::Name,
        Self::Value,
        Self::Ref,
        Self::Null,
        Self::Num,
        Self::NA,
    ];

    /// Excel-style error label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Div0 => "#DIV/0!",
            Self::Name => "#NAME?",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Null => "#NULL!",
            Self::Num => "#NUM!",
            Self::NA => "#N/A",
        }
    }

    /// Parse an error label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "#DIV/0!" => Some(Self::Div0),
            "#NAME?" => Some(Self::Name),
            "#VALUE!" => Some(Self::Value),
            "#REF!" => Some(Self::Ref),
            "#NULL!" => Some(Self::Null),
            "#NUM!" => Some(Self::Num),
            "#N/A" => Some(Self::NA),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single cell of tabular data.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Error(ErrorValue),
}

impl CellValue {
    /// Wrap a computed float, mapping NaN and infinities to `#NUM!`.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Self::Float(value)
        } else {
            Self::Error(ErrorValue::Num)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// True for `Int` and `Float` cells only.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Strict numeric view: `Some` only for `Int` and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Coerce to a number the way arithmetic operators do.
    ///
    /// Nulls count as zero, booleans as 0/1, timestamps as serial dates and
    /// numeric-looking text is parsed. Anything else, including text that
    /// parses to NaN or infinity, is `#VALUE!`.
    pub fn as_number(&self) -> Result<f64, ErrorValue> {
        match self {
            Self::Null => Ok(0.0),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Ok(*i as f64),
            Self::Float(f) => Ok(*f),
            Self::Timestamp(dt) => Ok(datetime_to_serial(*dt)),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or(ErrorValue::Value),
            Self::Error(e) => Err(*e),
        }
    }

    /// Coerce to a boolean the way IF/AND/OR do.
    pub fn as_bool(&self) -> Result<bool, ErrorValue> {
        match self {
            Self::Null => Ok(false),
            Self::Bool(b) => Ok(*b),
            Self::Int(i) => Ok(*i != 0),
            Self::Float(f) => Ok(*f != 0.0),
            Self::Timestamp(_) => Ok(true),
            Self::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorValue::Value)
                }
            }
            Self::Error(e) => Err(*e),
        }
    }

    /// Coerce to text the way `&` and CONCATENATE do.
    pub fn as_text(&self) -> Result<String, ErrorValue> {
        match self {
            Self::Error(e) => Err(*e),
            other => Ok(other.to_string()),
        }
    }

    /// Coerce to a timestamp; numbers are read as serial dates.
    pub fn as_timestamp(&self) -> Result<NaiveDateTime, ErrorValue> {
        match self {
            Self::Timestamp(dt) => Ok(*dt),
            Self::Text(s) => {
                NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| {
                        chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                            .map(|d| d.and_time(chrono::NaiveTime::MIN))
                    })
                    .map_err(|_| ErrorValue::Value)
            }
            other => {
                let serial = other.as_number()?;
                serial_to_datetime(serial).ok_or(ErrorValue::Num)
            }
        }
    }

    /// Lookup-style equality: numbers by value, text case-insensitively.
    pub fn loose_eq(&self, other: &CellValue) -> bool {
        matches!(self.compare(other), Some(Ordering::Equal))
    }

    /// Excel ordering: numbers < text < booleans, nulls act as 0 or "".
    pub fn compare(&self, other: &CellValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Error(_), _) | (_, Self::Error(_)) => None,
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
            (Self::Text(a), Self::Null) => Some(a.as_str().cmp("")),
            (Self::Null, Self::Text(b)) => Some("".cmp(b.as_str())),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Bool(_), Self::Null) => Some(Ordering::Greater),
            (Self::Null, Self::Bool(_)) => Some(Ordering::Less),
            (Self::Bool(_), _) => Some(Ordering::Greater),
            (_, Self::Bool(_)) => Some(Ordering::Less),
            (Self::Text(_), _) => Some(Ordering::Greater),
            (_, Self::Text(_)) => Some(Ordering::Less),
            (a, b) => {
                let left = a.as_number().ok()?;
                let right = b.as_number().ok()?;
                left.partial_cmp(&right)
            }
        }
    }
}

/// Render a float without a trailing ".0" for whole numbers.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(v) => f.write_str(&format_number(*v)),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Self::Error(e) => f.write_str(e.label()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            Self::Float(_) => serializer.serialize_none(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Timestamp(_) | Self::Error(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl From<ErrorValue> for CellValue {
    fn from(value: ErrorValue) -> Self {
        Self::Error(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
