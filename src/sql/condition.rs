//! Structured WHERE trees and their compilation to SQL.
//!
//! A condition is an ordered map from column name to one of three node
//! shapes:
//!
//! - *simple*: a scalar; `{"id": 1}` renders `id = ?`
//! - *regular*: operator to value; `{"age": {">": 18, "<=": 65}}`
//!   renders `age > ? AND age <= ?`
//! - *comprehensive*: `{"operator": ">", "value": 10, "placeholder": "N"}`
//!   with explicit bind-vs-inline control
//!
//! Columns and the operators on one column are AND-conjoined. A node
//! that mixes regular operator keys with comprehensive keys is
//! ambiguous and rejected.

use std::fmt::Write as _;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::JrmError;
use crate::sql::dialect::SqlDialect;
use crate::sql::format::{self, SqlValue};
use crate::value::Value;

/// One condition node.
#[derive(Debug, Clone, PartialEq)]
pub enum CondNode {
    Simple(Value),
    Regular(IndexMap<String, Value>),
    Comprehensive {
        operator: String,
        value: Value,
        placeholder: bool,
    },
}

/// An ordered condition tree; empty means no WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition(pub IndexMap<String, CondNode>);

const COMPREHENSIVE_KEYS: [&str; 3] = ["operator", "value", "placeholder"];

/// Operators accepted in regular and comprehensive nodes. The operator
/// token is spliced into SQL, so anything outside this set is rejected.
fn validate_operator(op: &str) -> Result<String, JrmError> {
    let upper = op.trim().to_uppercase();
    match upper.as_str() {
        "=" | "!=" | "<>" | ">" | ">=" | "<" | "<=" | "LIKE" | "NOT LIKE" | "ILIKE"
        | "IN" | "NOT IN" | "IS" | "IS NOT" | "REGEXP" => Ok(upper),
        _ => Err(JrmError::MalformedBinding(format!(
            "unsupported condition operator {op:?}"
        ))),
    }
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Simple equality: `col = value`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), CondNode::Simple(value.into()));
        self
    }

    /// Regular operator condition; repeated calls on one column
    /// accumulate AND-conjoined operators.
    pub fn op(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let column = column.into();
        match self.0.entry(column).or_insert_with(|| CondNode::Regular(IndexMap::new())) {
            CondNode::Regular(ops) => {
                ops.insert(operator.into(), value.into());
            }
            node => {
                *node = CondNode::Regular(IndexMap::from_iter([(operator.into(), value.into())]));
            }
        }
        self
    }

    /// Comprehensive condition with explicit bind-vs-inline control.
    pub fn explicit(
        mut self,
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
        placeholder: bool,
    ) -> Self {
        self.0.insert(
            column.into(),
            CondNode::Comprehensive {
                operator: operator.into(),
                value: value.into(),
                placeholder,
            },
        );
        self
    }

    /// Parse a condition tree from its JSON mapping shape.
    pub fn from_json(json: &Json) -> Result<Self, JrmError> {
        let obj = match json {
            Json::Null => return Ok(Condition::new()),
            Json::Object(map) => map,
            other => {
                return Err(JrmError::MalformedBinding(format!(
                    "condition must be a mapping, got {other}"
                )))
            }
        };

        let mut cond = Condition::new();
        for (column, node) in obj {
            cond.0.insert(column.clone(), parse_node(node)?);
        }
        Ok(cond)
    }

    /// Compile to a WHERE fragment (without the keyword) and the bind
    /// vector, using canonical `?` markers.
    pub fn compile(&self, dialect: &dyn SqlDialect) -> Result<(String, Vec<Value>), JrmError> {
        let mut sql = String::new();
        let mut binds: Vec<Value> = Vec::new();

        for (column, node) in &self.0 {
            let quoted = dialect.quote_table(column);
            match node {
                CondNode::Simple(value) => {
                    push_conjunct(&mut sql);
                    push_operator_clause(&mut sql, &mut binds, dialect, &quoted, "=", value, true)?;
                }
                CondNode::Regular(ops) => {
                    for (op, value) in ops {
                        push_conjunct(&mut sql);
                        let op = validate_operator(op)?;
                        push_operator_clause(
                            &mut sql, &mut binds, dialect, &quoted, &op, value, true,
                        )?;
                    }
                }
                CondNode::Comprehensive {
                    operator,
                    value,
                    placeholder,
                } => {
                    push_conjunct(&mut sql);
                    let op = validate_operator(operator)?;
                    push_operator_clause(
                        &mut sql,
                        &mut binds,
                        dialect,
                        &quoted,
                        &op,
                        value,
                        *placeholder,
                    )?;
                }
            }
        }

        Ok((sql, binds))
    }
}

fn push_conjunct(sql: &mut String) {
    if !sql.is_empty() {
        sql.push_str(" AND ");
    }
}

fn push_operator_clause(
    sql: &mut String,
    binds: &mut Vec<Value>,
    dialect: &dyn SqlDialect,
    column: &str,
    op: &str,
    value: &Value,
    placeholder: bool,
) -> Result<(), JrmError> {
    if op == "IN" || op == "NOT IN" {
        let items: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        if items.is_empty() {
            return Err(JrmError::MalformedBinding(format!(
                "{op} requires a non-empty sequence"
            )));
        }
        let _ = write!(sql, "{column} {op} (");
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            push_value(sql, binds, dialect, item, placeholder)?;
        }
        sql.push(')');
        return Ok(());
    }

    let _ = write!(sql, "{column} {op} ");
    push_value(sql, binds, dialect, value, placeholder)
}

fn push_value(
    sql: &mut String,
    binds: &mut Vec<Value>,
    dialect: &dyn SqlDialect,
    value: &Value,
    placeholder: bool,
) -> Result<(), JrmError> {
    if !placeholder {
        sql.push_str(&format::inline_value(dialect, value)?);
        return Ok(());
    }
    match format::prepare(value)? {
        SqlValue::Bind(v) => {
            sql.push('?');
            binds.push(v);
        }
        SqlValue::Inline(text) => sql.push_str(&text),
    }
    Ok(())
}

fn parse_node(json: &Json) -> Result<CondNode, JrmError> {
    let obj = match json {
        Json::Object(map) => map,
        scalar => return Ok(CondNode::Simple(Value::from_json(scalar))),
    };

    let comp_count = obj
        .keys()
        .filter(|k| COMPREHENSIVE_KEYS.contains(&k.as_str()))
        .count();
    let complete = obj.contains_key("operator") && obj.contains_key("value");

    if complete {
        if comp_count != obj.len() {
            return Err(JrmError::MalformedBinding(
                "condition mixes comprehensive keys with operator keys".into(),
            ));
        }
        let placeholder = match obj.get("placeholder") {
            None => true,
            Some(Json::String(s)) => !s.eq_ignore_ascii_case("n"),
            Some(Json::Bool(b)) => *b,
            Some(other) => {
                return Err(JrmError::MalformedBinding(format!(
                    "placeholder must be Y/N, got {other}"
                )))
            }
        };
        return Ok(CondNode::Comprehensive {
            operator: obj["operator"]
                .as_str()
                .ok_or_else(|| {
                    JrmError::MalformedBinding("comprehensive operator must be a string".into())
                })?
                .to_string(),
            value: Value::from_json(&obj["value"]),
            placeholder,
        });
    }

    // Incomplete comprehensive keys mixed with operator keys are ambiguous.
    if comp_count > 0 && comp_count != obj.len() {
        return Err(JrmError::MalformedBinding(
            "condition mixes comprehensive keys with operator keys".into(),
        ));
    }

    // A lone key named like a comprehensive field is a regular operator.
    let mut ops = IndexMap::new();
    for (op, value) in obj {
        ops.insert(op.clone(), Value::from_json(value));
    }
    Ok(CondNode::Regular(ops))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::Dialect;

    #[test]
    fn simple_condition() {
        let cond = Condition::new().eq("id", 1);
        let (sql, binds) = cond.compile(&Dialect::Sqlite).unwrap();
        assert_eq!(sql, "\"id\" = ?");
        assert_eq!(binds, vec![Value::Int(1)]);
    }

    #[test]
    fn empty_condition_compiles_to_nothing() {
        let (sql, binds) = Condition::new().compile(&Dialect::Postgres).unwrap();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn range_condition_two_conjuncts_in_order() {
        let cond = Condition::new().op("age", ">", 18).op("age", "<=", 65);
        let (sql, binds) = cond.compile(&Dialect::Postgres).unwrap();
        assert_eq!(sql, "\"age\" > ? AND \"age\" <= ?");
        assert_eq!(binds, vec![Value::Int(18), Value::Int(65)]);
    }

    #[test]
    fn like_condition() {
        let cond = Condition::new().op("email", "LIKE", "%@x.com");
        let (sql, binds) = cond.compile(&Dialect::Postgres).unwrap();
        assert_eq!(sql, "\"email\" LIKE ?");
        assert_eq!(binds, vec![Value::Text("%@x.com".into())]);
    }

    #[test]
    fn in_condition_expands() {
        let cond = Condition::new().op("id", "IN", vec![1, 2, 3]);
        let (sql, binds) = cond.compile(&Dialect::Postgres).unwrap();
        assert_eq!(sql, "\"id\" IN (?, ?, ?)");
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn empty_in_rejected() {
        let cond = Condition::new().op("id", "IN", Vec::<i64>::new());
        assert!(cond.compile(&Dialect::Postgres).is_err());
    }

    #[test]
    fn comprehensive_inline() {
        let cond = Condition::new().explicit("ts", ">", "2024-01-01", false);
        let (sql, binds) = cond.compile(&Dialect::Postgres).unwrap();
        assert_eq!(sql, "\"ts\" > '2024-01-01'");
        assert!(binds.is_empty());
    }

    #[test]
    fn keyword_value_inlines() {
        let cond = Condition::new().eq("ts", "`CURRENT_TIMESTAMP`");
        let (sql, binds) = cond.compile(&Dialect::Postgres).unwrap();
        assert_eq!(sql, "\"ts\" = CURRENT_TIMESTAMP");
        assert!(binds.is_empty());
    }

    #[test]
    fn unknown_operator_rejected() {
        let cond = Condition::new().op("a", "; DROP TABLE x; --", 1);
        assert!(matches!(
            cond.compile(&Dialect::Postgres),
            Err(JrmError::MalformedBinding(_))
        ));
    }

    #[test]
    fn parse_shapes_from_json() {
        let json = serde_json::json!({
            "id": 1,
            "age": {">": 18, "<=": 65},
            "note": {"operator": "LIKE", "value": "%x%", "placeholder": "Y"}
        });
        let cond = Condition::from_json(&json).unwrap();
        assert!(matches!(cond.0["id"], CondNode::Simple(_)));
        assert!(matches!(cond.0["age"], CondNode::Regular(_)));
        assert!(matches!(cond.0["note"], CondNode::Comprehensive { .. }));
    }

    #[test]
    fn lone_comprehensive_key_is_regular() {
        // Not a complete operator/value pair, so "operator" is read as
        // a (rejected at compile time) regular operator token.
        let json = serde_json::json!({"col": {"operator": ">"}});
        let cond = Condition::from_json(&json).unwrap();
        assert!(matches!(cond.0["col"], CondNode::Regular(_)));
    }

    #[test]
    fn ambiguous_mixture_rejected() {
        let json = serde_json::json!({"col": {"=": 1, "operator": ">", "value": 2}});
        assert!(matches!(
            Condition::from_json(&json),
            Err(JrmError::MalformedBinding(_))
        ));
    }

    #[test]
    fn mysql_quoting_in_fragment() {
        let cond = Condition::new().eq("name", "ada");
        let (sql, _) = cond.compile(&Dialect::MySql).unwrap();
        assert_eq!(sql, "`name` = ?");
    }
}
