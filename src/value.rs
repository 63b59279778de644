//! Values and records.
//!
//! Every operation speaks in [`Record`]s: insertion-ordered maps from
//! column name to [`Value`]. The order is observable; it decides INSERT
//! column order and CSV column order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value as Json;

/// A single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<Utc>),
    /// Flat or nested sequence; bound as a `|`-joined string or JSON.
    Array(Vec<Value>),
    /// Nested mapping; bound as JSON text.
    Json(Json),
}

/// An insertion-ordered row.
pub type Record = IndexMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Backtick-delimited strings are SQL keyword literals: the token is
    /// inlined verbatim instead of bound (`` `CURRENT_TIMESTAMP` ``).
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Value::Text(s) if s.len() >= 2 && s.starts_with('`') && s.ends_with('`') => {
                Some(&s[1..s.len() - 1])
            }
            _ => None,
        }
    }

    /// True for values that serialize to JSON when bound (nested
    /// mappings, sequences of mappings).
    pub fn is_compound(&self) -> bool {
        match self {
            Value::Json(_) => true,
            Value::Array(items) => items.iter().any(Value::is_compound),
            _ => false,
        }
    }

    /// Convert a `serde_json` value. Numbers become `Int` when they fit,
    /// `Float` otherwise; objects become `Json`.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::Text(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(_) => Value::Json(json.clone()),
        }
    }

    /// Render into a `serde_json` value (timestamps become ISO-8601
    /// strings, bytes become lossy UTF-8).
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Text(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => Json::String(t.format("%H:%M:%S").to_string()),
            Value::DateTime(dt) => Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::DateTimeTz(dt) => Json::String(dt.to_rfc3339()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(j) => j.clone(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Decimal(d) => serializer.serialize_str(&d.to_string()),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => serializer.serialize_str(&t.format("%H:%M:%S").to_string()),
            Value::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            Value::DateTimeTz(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Json(j) => j.serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTimeTz(v)
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::from_json(&v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Build a [`Record`] in place.
///
/// ```
/// use longjrm::record;
/// let r = record! { "id" => 1, "name" => "ada" };
/// assert_eq!(r.get_index(0).unwrap().0, "id");
/// ```
#[macro_export]
macro_rules! record {
    ( $( $k:expr => $v:expr ),* $(,)? ) => {{
        let mut r = $crate::value::Record::new();
        $( r.insert($k.to_string(), $crate::value::Value::from($v)); )*
        r
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_detection() {
        assert_eq!(
            Value::Text("`CURRENT_TIMESTAMP`".into()).as_keyword(),
            Some("CURRENT_TIMESTAMP")
        );
        assert_eq!(Value::Text("plain".into()).as_keyword(), None);
        assert_eq!(Value::Text("`".into()).as_keyword(), None);
        assert_eq!(Value::Int(1).as_keyword(), None);
    }

    #[test]
    fn record_preserves_order() {
        let r = record! { "zeta" => 1, "alpha" => 2, "mid" => 3 };
        let keys: Vec<&str> = r.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn json_conversion() {
        let j = serde_json::json!({"a": 1});
        assert!(matches!(Value::from_json(&j), Value::Json(_)));
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(
            Value::from_json(&serde_json::json!("x")),
            Value::Text("x".into())
        );
    }

    #[test]
    fn compound_detection() {
        assert!(Value::Json(serde_json::json!({"a": 1})).is_compound());
        assert!(Value::Array(vec![Value::Json(serde_json::json!({}))]).is_compound());
        assert!(!Value::Array(vec![Value::Int(1), Value::Int(2)]).is_compound());
    }
}
