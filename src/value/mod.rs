//! # Value Type System
//!
//! Tagged runtime values: Null, Bool, Int, Decimal, String, Date, Duration,
//! List, Record, plus the arena-index Ref used for `any of` bindings.
//!
//! Arithmetic promotes Int to Decimal when either side is a Decimal.
//! Ordering across incompatible tags is a runtime error; equality across
//! incompatible tags is simply `false` (so `x == null` is always answerable).
//! Dates order the way their ISO-8601 renderings do.

use crate::error::{CompileResult, VagueError};
use chrono::{Months, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A record under construction or fully built: field name → value, in
/// declaration order.
pub type Record = IndexMap<String, Value>;

/// Address of a record inside the generation arena: `(collection, index)`.
///
/// `any of` bindings hold one of these rather than a copy, so `then` hooks
/// mutate the referenced record in place and every consumer observes the
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub collection: String,
    pub index: usize,
}

/// A calendar-aware duration produced by date plugins: whole months plus
/// days. Weeks and years reduce to days and months respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalendarDuration {
    pub months: i32,
    pub days: i64,
}

impl CalendarDuration {
    pub fn days(days: i64) -> Self {
        CalendarDuration { months: 0, days }
    }

    pub fn weeks(weeks: i64) -> Self {
        CalendarDuration {
            months: 0,
            days: weeks * 7,
        }
    }

    pub fn months(months: i32) -> Self {
        CalendarDuration { months, days: 0 }
    }

    pub fn years(years: i32) -> Self {
        CalendarDuration {
            months: years * 12,
            days: 0,
        }
    }
}

/// Runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    String(String),
    Date(NaiveDate),
    Duration(CalendarDuration),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
    /// Arena index; resolved through the dataset driver on access and at
    /// emission time.
    Ref(RecordRef),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Tag name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Ref(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view, promoting Int to f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean view; anything but Bool is a type error where a condition is
    /// expected.
    pub fn as_bool(&self) -> CompileResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(VagueError::runtime(format!(
                "expected a boolean condition, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality with language semantics: numeric tags compare by value,
    /// anything else requires matching tags. Never errors, so `x == null`
    /// works on every value.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (a, b) => a == b,
        }
    }

    /// Ordering with language semantics. Incompatible tags (including Null
    /// on either side) are a runtime error.
    pub fn try_cmp(&self, other: &Value) -> CompileResult<Ordering> {
        let incompatible = || {
            VagueError::runtime(format!(
                "cannot compare {} with {}",
                self.type_name(),
                other.type_name()
            ))
        };
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b).ok_or_else(incompatible),
            (Value::Int(a), Value::Decimal(b)) => {
                (*a as f64).partial_cmp(b).ok_or_else(incompatible)
            }
            (Value::Decimal(a), Value::Int(b)) => {
                a.partial_cmp(&(*b as f64)).ok_or_else(incompatible)
            }
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            _ => Err(incompatible()),
        }
    }

    /// `+` with Int→Decimal promotion, `date + duration`, and
    /// `duration + duration`.
    pub fn add(&self, other: &Value) -> CompileResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Date(d), Value::Duration(span)) | (Value::Duration(span), Value::Date(d)) => {
                shift_date(*d, *span, 1).map(Value::Date)
            }
            (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(CalendarDuration {
                months: a.months + b.months,
                days: a.days + b.days,
            })),
            _ => self.numeric_op(other, "+", |a, b| a + b),
        }
    }

    /// `-` with Int→Decimal promotion and `date - duration`.
    pub fn sub(&self, other: &Value) -> CompileResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Value::Date(d), Value::Duration(span)) => shift_date(*d, *span, -1).map(Value::Date),
            _ => self.numeric_op(other, "-", |a, b| a - b),
        }
    }

    /// `*` with Int→Decimal promotion.
    pub fn mul(&self, other: &Value) -> CompileResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => self.numeric_op(other, "*", |a, b| a * b),
        }
    }

    /// `/` always yields Decimal; division by zero is a runtime error.
    pub fn div(&self, other: &Value) -> CompileResult<Value> {
        match other.as_number() {
            Some(d) if d == 0.0 => Err(VagueError::runtime("division by zero")),
            _ => self.numeric_op(other, "/", |a, b| a / b),
        }
    }

    fn numeric_op(
        &self,
        other: &Value,
        op: &str,
        apply: impl Fn(f64, f64) -> f64,
    ) -> CompileResult<Value> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => Ok(Value::Decimal(apply(a, b))),
            _ => Err(VagueError::runtime(format!(
                "cannot apply '{op}' to {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Convert to a JSON value for emission. Dates render as ISO-8601
    /// strings, decimals as numbers. `Ref` values must be resolved by the
    /// driver beforehand; an unresolved one degrades to null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::Number((*v).into()),
            Value::Decimal(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::Duration(span) => serde_json::Value::String(format!(
                "P{}M{}D",
                span.months, span.days
            )),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Ref(_) => serde_json::Value::Null,
        }
    }
}

/// Apply a calendar duration to a date. `sign` is +1 or -1.
fn shift_date(date: NaiveDate, span: CalendarDuration, sign: i32) -> CompileResult<NaiveDate> {
    let months = span.months * sign;
    let with_months = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    let days = span.days * i64::from(sign);
    with_months
        .and_then(|d| d.checked_add_signed(chrono::Duration::days(days)))
        .ok_or_else(|| {
            VagueError::runtime(format!(
                "date arithmetic out of range: {} {} P{}M{}D",
                date.format("%Y-%m-%d"),
                if sign >= 0 { "+" } else { "-" },
                span.months,
                span.days
            ))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Duration(span) => write!(f, "P{}M{}D", span.months, span.days),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Ref(r) => write!(f, "<{}[{}]>", r.collection, r.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn int_decimal_promotion() {
        let sum = Value::Int(2).add(&Value::Decimal(0.5)).expect("add");
        assert_eq!(sum, Value::Decimal(2.5));

        let prod = Value::Int(3).mul(&Value::Int(4)).expect("mul");
        assert_eq!(prod, Value::Int(12));
    }

    #[test]
    fn division_always_decimal() {
        assert_eq!(
            Value::Int(7).div(&Value::Int(2)).expect("div"),
            Value::Decimal(3.5)
        );
    }

    #[test]
    fn division_by_zero_errors() {
        assert!(Value::Int(1).div(&Value::Int(0)).is_err());
    }

    #[test]
    fn cross_tag_comparison_errors() {
        assert!(Value::Int(1).try_cmp(&Value::string("a")).is_err());
        assert!(Value::Null.try_cmp(&Value::Int(1)).is_err());
    }

    #[test]
    fn equality_never_errors() {
        assert!(!Value::Int(1).equals(&Value::string("1")));
        assert!(Value::Null.equals(&Value::Null));
        assert!(!Value::Null.equals(&Value::Int(0)));
        assert!(Value::Int(1).equals(&Value::Decimal(1.0)));
    }

    #[test]
    fn dates_order_like_iso_strings() {
        let earlier = Value::Date(date(2023, 12, 31));
        let later = Value::Date(date(2024, 1, 1));
        assert_eq!(earlier.try_cmp(&later).expect("cmp"), Ordering::Less);
    }

    #[test]
    fn date_plus_duration() {
        let base = Value::Date(date(2024, 1, 31));
        let shifted = base
            .add(&Value::Duration(CalendarDuration::months(1)))
            .expect("add");
        // Clamped to the end of February.
        assert_eq!(shifted, Value::Date(date(2024, 2, 29)));

        let weeks = Value::Date(date(2024, 1, 1))
            .add(&Value::Duration(CalendarDuration::weeks(2)))
            .expect("add");
        assert_eq!(weeks, Value::Date(date(2024, 1, 15)));
    }

    #[test]
    fn date_plus_raw_int_errors() {
        assert!(Value::Date(date(2024, 1, 1)).add(&Value::Int(5)).is_err());
    }

    #[test]
    fn json_emission() {
        let mut fields = IndexMap::new();
        fields.insert("due".to_string(), Value::Date(date(2024, 3, 1)));
        fields.insert("total".to_string(), Value::Decimal(12.5));
        fields.insert("count".to_string(), Value::Int(3));
        let record = Value::Record(fields);

        let json = record.to_json();
        assert_eq!(json["due"], serde_json::json!("2024-03-01"));
        assert_eq!(json["total"], serde_json::json!(12.5));
        assert_eq!(json["count"], serde_json::json!(3));
    }
}
