//! Value formatting for binding and inlining.
//!
//! Each value headed into a statement goes one of two ways: bound
//! through a placeholder, or inlined into the SQL text. Backtick
//! keyword literals (`` `CURRENT_TIMESTAMP` ``) always inline; a
//! comprehensive condition can force inlining for any value.

use crate::error::JrmError;
use crate::sql::dialect::SqlDialect;
use crate::value::Value;

/// A value position in a rendered statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Bind through a placeholder.
    Bind(Value),
    /// Splice this SQL text verbatim.
    Inline(String),
}

/// Decide bind-vs-inline for one value and apply the binding encoding:
/// nested mappings and sequences of mappings become JSON text, flat
/// scalar sequences a `|`-joined string, timestamps stay native.
pub fn prepare(value: &Value) -> Result<SqlValue, JrmError> {
    if let Some(keyword) = value.as_keyword() {
        return Ok(SqlValue::Inline(keyword.to_string()));
    }
    Ok(SqlValue::Bind(encode_for_bind(value)?))
}

/// Binding encoding without the keyword check.
pub fn encode_for_bind(value: &Value) -> Result<Value, JrmError> {
    match value {
        Value::Json(j) => Ok(Value::Text(serde_json::to_string(j)?)),
        Value::Array(items) => {
            if value.is_compound() {
                let json: Vec<serde_json::Value> = items.iter().map(Value::to_json).collect();
                Ok(Value::Text(serde_json::to_string(&json)?))
            } else {
                let joined: Vec<String> = items.iter().map(plain_text).collect();
                Ok(Value::Text(joined.join("|")))
            }
        }
        other => Ok(other.clone()),
    }
}

pub(crate) fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        Value::Time(t) => t.format("%H:%M:%S").to_string(),
        Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        Value::DateTimeTz(dt) => dt.to_rfc3339(),
        Value::Array(_) | Value::Json(_) => value.to_json().to_string(),
    }
}

/// Render a value as a SQL literal for inline interpolation. Strings
/// are quoted with single-quote doubling; timestamps become ISO-8601
/// strings.
pub fn inline_value(dialect: &dyn SqlDialect, value: &Value) -> Result<String, JrmError> {
    if let Some(keyword) = value.as_keyword() {
        return Ok(keyword.to_string());
    }
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => dialect.format_bool(*b).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Text(s) => dialect.quote_string(s),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("X'{hex}'")
        }
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::DateTimeTz(_) => {
            dialect.quote_string(&plain_text(value))
        }
        Value::Array(_) => match encode_for_bind(value)? {
            Value::Text(s) => dialect.quote_string(&s),
            _ => unreachable!("arrays encode to text"),
        },
        Value::Json(j) => dialect.quote_string(&serde_json::to_string(j)?),
    })
}

/// Replace every placeholder marker with an inline literal, for
/// drivers that cannot bind parameters (Spark below 3.4).
pub fn inline_sql(
    dialect: &dyn SqlDialect,
    sql: &str,
    params: &crate::sql::placeholder::Params,
) -> Result<String, JrmError> {
    use crate::sql::placeholder::{scan, MarkerKind, Params};

    let markers = scan(sql);
    if markers.is_empty() {
        if !params.is_empty() {
            return Err(JrmError::MalformedBinding(format!(
                "no placeholders in SQL but {} value(s) supplied",
                params.len()
            )));
        }
        return Ok(sql.to_string());
    }

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for (idx, m) in markers.iter().enumerate() {
        out.push_str(&sql[cursor..m.start]);
        cursor = m.end;
        let value = match (&m.kind, params) {
            (MarkerKind::Positional(_), Params::Positional(vals)) => vals.get(idx),
            (MarkerKind::Numbered(_, n), Params::Positional(vals)) => {
                n.checked_sub(1).and_then(|i| vals.get(i))
            }
            (MarkerKind::Named(_, name), Params::Named(map)) => map.get(name),
            _ => None,
        }
        .ok_or_else(|| {
            JrmError::MalformedBinding(format!("no value for placeholder {}", idx + 1))
        })?;
        out.push_str(&inline_value(dialect, value)?);
    }
    out.push_str(&sql[cursor..]);
    Ok(out)
}
