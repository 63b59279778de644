//! Statement builders.
//!
//! Builders for SELECT, INSERT, UPDATE, DELETE and MERGE render
//! dialect-correct SQL with canonical `?` markers plus the bind vector;
//! the driver layer then normalizes markers to the driver's native
//! style. Record column order decides INSERT column order.

use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::JrmError;
use crate::sql::condition::Condition;
use crate::sql::dialect::{Dialect, LimitForm, SqlDialect, UpsertStyle};
use crate::sql::format::{self, SqlValue};
use crate::value::{Record, Value};

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap());

/// Quote plain (possibly qualified) identifiers; leave `*` and
/// expressions like `count(*)` untouched.
fn quote_if_ident(dialect: &dyn SqlDialect, s: &str) -> String {
    let trimmed = s.trim();
    if IDENT.is_match(trimmed) {
        dialect.quote_table(trimmed)
    } else {
        trimmed.to_string()
    }
}

fn render_order_by(dialect: &dyn SqlDialect, order_by: &[String]) -> Result<String, JrmError> {
    let mut parts = Vec::with_capacity(order_by.len());
    for entry in order_by {
        let mut it = entry.split_whitespace();
        let col = it.next().ok_or_else(|| {
            JrmError::MalformedBinding("empty order_by entry".into())
        })?;
        let dir = match it.next() {
            None => "",
            Some(d) if d.eq_ignore_ascii_case("asc") => " ASC",
            Some(d) if d.eq_ignore_ascii_case("desc") => " DESC",
            Some(d) => {
                return Err(JrmError::MalformedBinding(format!(
                    "bad order_by direction {d:?}"
                )))
            }
        };
        parts.push(format!("{}{}", quote_if_ident(dialect, col), dir));
    }
    Ok(parts.join(", "))
}

fn push_prepared(
    sql: &mut String,
    binds: &mut Vec<Value>,
    value: &Value,
) -> Result<(), JrmError> {
    match format::prepare(value)? {
        SqlValue::Bind(v) => {
            sql.push('?');
            binds.push(v);
        }
        SqlValue::Inline(text) => sql.push_str(&text),
    }
    Ok(())
}

// ============================================================================
// SELECT
// ============================================================================

/// SELECT statement.
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until rendered with to_sql()"]
pub struct Select {
    pub table: String,
    pub columns: Vec<String>,
    pub condition: Condition,
    pub order_by: Vec<String>,
    /// Final, already-resolved row cap. `None` means no cap.
    pub limit: Option<u64>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            condition: Condition::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn order_by(mut self, order_by: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.order_by = order_by.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>), JrmError> {
        let column_list = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_if_ident(&dialect, c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = String::from("SELECT ");
        if let (LimitForm::Top, Some(n)) = (dialect.limit_form(), self.limit) {
            let _ = write!(sql, "TOP {n} ");
        }
        let _ = write!(sql, "{column_list} FROM {}", dialect.quote_table(&self.table));

        let (where_sql, binds) = self.condition.compile(&dialect)?;
        if !where_sql.is_empty() {
            let _ = write!(sql, " WHERE {where_sql}");
        }

        if !self.order_by.is_empty() {
            let _ = write!(sql, " ORDER BY {}", render_order_by(&dialect, &self.order_by)?);
        }

        if let Some(n) = self.limit {
            match dialect.limit_form() {
                LimitForm::Limit => {
                    let _ = write!(sql, " LIMIT {n}");
                }
                LimitForm::FetchFirst => {
                    let _ = write!(sql, " FETCH FIRST {n} ROWS ONLY");
                }
                LimitForm::Top => {}
            }
        }

        Ok((sql, binds))
    }
}

// ============================================================================
// INSERT
// ============================================================================

/// INSERT statement, single- or multi-row. The column set comes from
/// the first record; later records missing a column bind NULL.
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until rendered with to_sql()"]
pub struct Insert {
    pub table: String,
    pub records: Vec<Record>,
    pub return_columns: Vec<String>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            records: Vec::new(),
            return_columns: Vec::new(),
        }
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    /// RETURNING columns; honored on backends that support it.
    pub fn returning(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.return_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>), JrmError> {
        let first = self.records.first().ok_or_else(|| {
            JrmError::MalformedBinding("insert requires at least one record".into())
        })?;
        let columns: Vec<&String> = first.keys().collect();
        if columns.is_empty() {
            return Err(JrmError::MalformedBinding("insert record has no columns".into()));
        }

        let mut sql = format!("INSERT INTO {} (", dialect.quote_table(&self.table));
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&dialect.quote_identifier(col));
        }
        sql.push_str(") VALUES ");

        let mut binds = Vec::new();
        for (row_idx, record) in self.records.iter().enumerate() {
            if row_idx > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (i, col) in columns.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let value = record.get(*col).unwrap_or(&Value::Null);
                push_prepared(&mut sql, &mut binds, value)?;
            }
            sql.push(')');
        }

        if !self.return_columns.is_empty() && dialect.supports_returning() {
            sql.push_str(" RETURNING ");
            for (i, col) in self.return_columns.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&quote_if_ident(&dialect, col));
            }
        }

        Ok((sql, binds))
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// UPDATE statement. Data binds come before condition binds in the
/// shared vector. An empty condition updates all rows.
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until rendered with to_sql()"]
pub struct Update {
    pub table: String,
    pub data: Record,
    pub condition: Condition,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            data: Record::new(),
            condition: Condition::new(),
        }
    }

    pub fn set(mut self, data: Record) -> Self {
        self.data = data;
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>), JrmError> {
        if self.data.is_empty() {
            return Err(JrmError::MalformedBinding("update requires data".into()));
        }

        let mut sql = format!("UPDATE {} SET ", dialect.quote_table(&self.table));
        let mut binds = Vec::new();
        for (i, (col, value)) in self.data.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} = ", dialect.quote_identifier(col));
            push_prepared(&mut sql, &mut binds, value)?;
        }

        let (where_sql, where_binds) = self.condition.compile(&dialect)?;
        if !where_sql.is_empty() {
            let _ = write!(sql, " WHERE {where_sql}");
            binds.extend(where_binds);
        }

        Ok((sql, binds))
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// DELETE statement. An empty condition deletes all rows.
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until rendered with to_sql()"]
pub struct Delete {
    pub table: String,
    pub condition: Condition,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            condition: Condition::new(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>), JrmError> {
        let mut sql = format!("DELETE FROM {}", dialect.quote_table(&self.table));
        let (where_sql, binds) = self.condition.compile(&dialect)?;
        if !where_sql.is_empty() {
            let _ = write!(sql, " WHERE {where_sql}");
        }
        Ok((sql, binds))
    }
}

// ============================================================================
// MERGE (upsert)
// ============================================================================

/// Dialect-aware upsert: ON CONFLICT, ON DUPLICATE KEY, or MERGE INTO.
#[derive(Debug, Clone)]
#[must_use = "statements have no effect until rendered with to_sql()"]
pub struct Merge {
    pub table: String,
    pub records: Vec<Record>,
    pub key_columns: Vec<String>,
    /// Columns updated on match; defaults to data columns minus keys.
    pub update_columns: Option<Vec<String>>,
    /// Skip the update branch entirely (insert-if-absent).
    pub no_update: bool,
}

impl Merge {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            records: Vec::new(),
            key_columns: Vec::new(),
            update_columns: None,
            no_update: false,
        }
    }

    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }

    pub fn keys(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.key_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    pub fn update_columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.update_columns = Some(cols.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_update(mut self, no_update: bool) -> Self {
        self.no_update = no_update;
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>), JrmError> {
        let first = self.records.first().ok_or_else(|| {
            JrmError::MalformedBinding("merge requires at least one record".into())
        })?;
        if self.key_columns.is_empty() {
            return Err(JrmError::MalformedBinding("merge requires key columns".into()));
        }
        let columns: Vec<String> = first.keys().cloned().collect();
        for key in &self.key_columns {
            if !columns.contains(key) {
                return Err(JrmError::MalformedBinding(format!(
                    "merge key column {key:?} is not in the data"
                )));
            }
        }

        let update_cols: Vec<String> = match &self.update_columns {
            Some(cols) => cols.clone(),
            None => columns
                .iter()
                .filter(|c| !self.key_columns.contains(c))
                .cloned()
                .collect(),
        };
        // All-key records have nothing to update on match.
        let no_update = self.no_update || update_cols.is_empty();

        match dialect.upsert_style() {
            UpsertStyle::OnConflict => self.on_conflict(dialect, &columns, &update_cols, no_update),
            UpsertStyle::OnDuplicateKey => {
                self.on_duplicate_key(dialect, &columns, &update_cols, no_update)
            }
            UpsertStyle::MergeValues | UpsertStyle::MergeSelect => {
                self.merge_into(dialect, &columns, &update_cols, no_update)
            }
        }
    }

    fn values_list(
        &self,
        columns: &[String],
        sql: &mut String,
        binds: &mut Vec<Value>,
    ) -> Result<(), JrmError> {
        for (row_idx, record) in self.records.iter().enumerate() {
            if row_idx > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (i, col) in columns.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let value = record.get(col).unwrap_or(&Value::Null);
                push_prepared(sql, binds, value)?;
            }
            sql.push(')');
        }
        Ok(())
    }

    fn on_conflict(
        &self,
        dialect: Dialect,
        columns: &[String],
        update_cols: &[String],
        no_update: bool,
    ) -> Result<(String, Vec<Value>), JrmError> {
        let mut sql = format!("INSERT INTO {} (", dialect.quote_table(&self.table));
        sql.push_str(
            &columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
        );
        sql.push_str(") VALUES ");
        let mut binds = Vec::new();
        self.values_list(columns, &mut sql, &mut binds)?;

        let _ = write!(
            sql,
            " ON CONFLICT ({})",
            self.key_columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if no_update {
            sql.push_str(" DO NOTHING");
        } else {
            sql.push_str(" DO UPDATE SET ");
            for (i, col) in update_cols.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let quoted = dialect.quote_identifier(col);
                let _ = write!(sql, "{quoted} = EXCLUDED.{quoted}");
            }
        }

        Ok((sql, binds))
    }

    fn on_duplicate_key(
        &self,
        dialect: Dialect,
        columns: &[String],
        update_cols: &[String],
        no_update: bool,
    ) -> Result<(String, Vec<Value>), JrmError> {
        let verb = if no_update { "INSERT IGNORE INTO" } else { "INSERT INTO" };
        let mut sql = format!("{verb} {} (", dialect.quote_table(&self.table));
        sql.push_str(
            &columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
        );
        sql.push_str(") VALUES ");
        let mut binds = Vec::new();
        self.values_list(columns, &mut sql, &mut binds)?;

        if !no_update {
            sql.push_str(" ON DUPLICATE KEY UPDATE ");
            for (i, col) in update_cols.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let quoted = dialect.quote_identifier(col);
                let _ = write!(sql, "{quoted} = VALUES({quoted})");
            }
        }

        Ok((sql, binds))
    }

    fn merge_into(
        &self,
        dialect: Dialect,
        columns: &[String],
        update_cols: &[String],
        no_update: bool,
    ) -> Result<(String, Vec<Value>), JrmError> {
        let mut binds = Vec::new();
        let quoted_cols: Vec<String> =
            columns.iter().map(|c| dialect.quote_identifier(c)).collect();

        let mut sql = format!("MERGE INTO {} tgt USING (", dialect.quote_table(&self.table));
        match dialect.upsert_style() {
            UpsertStyle::MergeSelect => {
                // Oracle: one SELECT ... FROM DUAL per record.
                for (row_idx, record) in self.records.iter().enumerate() {
                    if row_idx > 0 {
                        sql.push_str(" UNION ALL ");
                    }
                    sql.push_str("SELECT ");
                    for (i, col) in columns.iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        let value = record.get(col).unwrap_or(&Value::Null);
                        push_prepared(&mut sql, &mut binds, value)?;
                        let _ = write!(sql, " AS {}", quoted_cols[i]);
                    }
                    sql.push_str(" FROM DUAL");
                }
                sql.push_str(") src");
            }
            _ => {
                sql.push_str("VALUES ");
                self.values_list(columns, &mut sql, &mut binds)?;
                let _ = write!(sql, ") AS src ({})", quoted_cols.join(", "));
            }
        }

        sql.push_str(" ON (");
        for (i, key) in self.key_columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            let quoted = dialect.quote_identifier(key);
            let _ = write!(sql, "tgt.{quoted} = src.{quoted}");
        }
        sql.push(')');

        if !no_update {
            sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
            for (i, col) in update_cols.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let quoted = dialect.quote_identifier(col);
                let _ = write!(sql, "tgt.{quoted} = src.{quoted}");
            }
        }

        let _ = write!(
            sql,
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            quoted_cols.join(", "),
            quoted_cols
                .iter()
                .map(|c| format!("src.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        if dialect.merge_requires_terminator() {
            sql.push(';');
        }

        Ok((sql, binds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn select_defaults_to_star() {
        let (sql, binds) = Select::from("t").to_sql(Dialect::Postgres).unwrap();
        assert_eq!(sql, "SELECT * FROM \"t\"");
        assert!(binds.is_empty());
    }

    #[test]
    fn select_full_shape() {
        let (sql, binds) = Select::from("users")
            .columns(["id", "name"])
            .filter(Condition::new().op("age", ">", 18))
            .order_by(["name desc"])
            .limit(Some(10))
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"age\" > ? ORDER BY \"name\" DESC LIMIT 10"
        );
        assert_eq!(binds, vec![Value::Int(18)]);
    }

    #[test]
    fn select_expressions_pass_through() {
        let (sql, _) = Select::from("t")
            .columns(["count(*)"])
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "SELECT count(*) FROM \"t\"");
    }

    #[test]
    fn select_limit_forms() {
        let base = || Select::from("t").limit(Some(5));
        let (sql, _) = base().to_sql(Dialect::Oracle).unwrap();
        assert_eq!(sql, "SELECT * FROM \"t\" FETCH FIRST 5 ROWS ONLY");
        let (sql, _) = base().to_sql(Dialect::SqlServer).unwrap();
        assert_eq!(sql, "SELECT TOP 5 * FROM [t]");
        let (sql, _) = base().to_sql(Dialect::MySql).unwrap();
        assert_eq!(sql, "SELECT * FROM `t` LIMIT 5");
    }

    #[test]
    fn insert_single_record() {
        let (sql, binds) = Insert::into("t")
            .record(record! { "id" => 1, "name" => "ada" })
            .to_sql(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "INSERT INTO \"t\" (\"id\", \"name\") VALUES (?, ?)");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn insert_keyword_value_inlines() {
        let (sql, binds) = Insert::into("t")
            .record(record! { "id" => 1, "ts" => "`CURRENT_TIMESTAMP`" })
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"id\", \"ts\") VALUES (?, CURRENT_TIMESTAMP)"
        );
        assert_eq!(binds, vec![Value::Int(1)]);
    }

    #[test]
    fn insert_multi_row_fills_missing_with_null() {
        let (sql, binds) = Insert::into("t")
            .records([record! { "a" => 1, "b" => 2 }, record! { "a" => 3 }])
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?, ?), (?, ?)");
        assert_eq!(binds[3], Value::Null);
    }

    #[test]
    fn insert_returning_is_postgres_only() {
        let stmt = Insert::into("t")
            .record(record! { "id" => 1 })
            .returning(["id"]);
        let (sql, _) = stmt.clone().to_sql(Dialect::Postgres).unwrap();
        assert!(sql.ends_with("RETURNING \"id\""));
        let (sql, _) = stmt.to_sql(Dialect::MySql).unwrap();
        assert!(!sql.contains("RETURNING"));
    }

    #[test]
    fn update_data_binds_before_where_binds() {
        let (sql, binds) = Update::table("t")
            .set(record! { "n" => "B" })
            .filter(Condition::new().eq("id", 1))
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"n\" = ? WHERE \"id\" = ?");
        assert_eq!(binds, vec![Value::Text("B".into()), Value::Int(1)]);
    }

    #[test]
    fn update_without_where_touches_all_rows() {
        let (sql, _) = Update::table("t")
            .set(record! { "n" => 1 })
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"n\" = ?");
    }

    #[test]
    fn delete_shapes() {
        let (sql, _) = Delete::from("t").to_sql(Dialect::Postgres).unwrap();
        assert_eq!(sql, "DELETE FROM \"t\"");
        let (sql, _) = Delete::from("t")
            .filter(Condition::new().eq("id", 1))
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "DELETE FROM \"t\" WHERE \"id\" = ?");
    }

    #[test]
    fn merge_on_conflict() {
        let (sql, binds) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"id\", \"n\") VALUES (?, ?) \
             ON CONFLICT (\"id\") DO UPDATE SET \"n\" = EXCLUDED.\"n\""
        );
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn merge_on_conflict_no_update() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .no_update(true)
            .to_sql(Dialect::Sqlite)
            .unwrap();
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn merge_on_duplicate_key() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .to_sql(Dialect::MySql)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `t` (`id`, `n`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `n` = VALUES(`n`)"
        );
    }

    #[test]
    fn merge_on_duplicate_key_no_update_uses_ignore() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .no_update(true)
            .to_sql(Dialect::MySql)
            .unwrap();
        assert!(sql.starts_with("INSERT IGNORE INTO `t`"));
        assert!(!sql.contains("ON DUPLICATE"));
    }

    #[test]
    fn merge_into_values() {
        let (sql, binds) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .to_sql(Dialect::Db2)
            .unwrap();
        assert_eq!(
            sql,
            "MERGE INTO \"t\" tgt USING (VALUES (?, ?)) AS src (\"id\", \"n\") \
             ON (tgt.\"id\" = src.\"id\") \
             WHEN MATCHED THEN UPDATE SET tgt.\"n\" = src.\"n\" \
             WHEN NOT MATCHED THEN INSERT (\"id\", \"n\") VALUES (src.\"id\", src.\"n\")"
        );
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn merge_select_from_dual_for_oracle() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .to_sql(Dialect::Oracle)
            .unwrap();
        assert!(sql.contains("USING (SELECT ? AS \"id\", ? AS \"n\" FROM DUAL) src"));
        assert!(!sql.contains("AS src ("));
    }

    #[test]
    fn merge_terminator_on_sqlserver() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1, "n" => "B" })
            .keys(["id"])
            .to_sql(Dialect::SqlServer)
            .unwrap();
        assert!(sql.ends_with(';'));
    }

    #[test]
    fn merge_all_key_columns_behaves_like_no_update() {
        let (sql, _) = Merge::into("t")
            .record(record! { "id" => 1 })
            .keys(["id"])
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert!(sql.ends_with("DO NOTHING"));
    }

    #[test]
    fn merge_missing_key_rejected() {
        let err = Merge::into("t")
            .record(record! { "n" => 1 })
            .keys(["id"])
            .to_sql(Dialect::Postgres)
            .unwrap_err();
        assert!(matches!(err, JrmError::MalformedBinding(_)));
    }
}
