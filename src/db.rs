//! The Db facade.
//!
//! Wraps one borrowed [`Client`] and exposes the data-structure-driven
//! surface: `select`, `insert`, `update`, `delete`, `merge`, raw
//! `execute`/`query`, transactions, and batch execution. Every call
//! returns the standardized [`DbResult`] envelope; driver statement
//! errors are caught per call and folded into `status = -1`, while
//! connection-level failures propagate as typed errors.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::connection::BackendType;
use crate::error::JrmError;
use crate::pool::Client;
use crate::sql::build::{Delete, Insert, Merge, Select, Update};
use crate::sql::condition::Condition;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::format;
use crate::sql::placeholder::{self, Params};
use crate::transaction::{IsolationLevel, Transaction};
use crate::value::{Record, Value};

/// The envelope every operation returns.
#[derive(Debug, Clone, Serialize)]
pub struct DbResult {
    /// 0 on success, -1 on a caught statement error.
    pub status: i32,
    pub message: String,
    /// Result rows (queries only).
    pub data: Vec<Record>,
    /// Column names (queries only).
    pub columns: Vec<String>,
    /// Rows affected or returned.
    pub count: i64,
}

impl DbResult {
    pub fn ok_count(count: i64) -> Self {
        Self {
            status: 0,
            message: "success".into(),
            data: Vec::new(),
            columns: Vec::new(),
            count,
        }
    }

    pub fn ok_rows(columns: Vec<String>, data: Vec<Record>) -> Self {
        let count = data.len() as i64;
        Self {
            status: 0,
            message: "success".into(),
            data,
            columns,
            count,
        }
    }

    /// A caught statement error, message verbatim from the driver.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: -1,
            message: message.into(),
            data: Vec::new(),
            columns: Vec::new(),
            count: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Options for `select`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Row cap. `None` and `Some(0)` both mean "no caller cap": the
    /// configured fetch limit applies.
    pub limit: Option<u64>,
    /// `"col"` or `"col DESC"` entries.
    pub order_by: Vec<String>,
}

impl QueryOptions {
    pub fn limit(n: u64) -> Self {
        Self {
            limit: Some(n),
            ..Self::default()
        }
    }
}

/// Options for `insert`.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// RETURNING columns; honored on PostgreSQL only.
    pub return_columns: Vec<String>,
    /// Records per multi-row INSERT statement.
    pub bulk_size: usize,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            return_columns: Vec::new(),
            bulk_size: 1000,
        }
    }
}

/// Options for `merge`.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Columns updated on match; defaults to data columns minus keys.
    pub update_columns: Option<Vec<String>>,
    /// Insert-if-absent: skip the update branch.
    pub no_update: bool,
}

/// One operation descriptor for `execute_batch`.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Insert {
        table: String,
        records: Vec<Record>,
    },
    Update {
        table: String,
        data: Record,
        condition: Condition,
    },
    Delete {
        table: String,
        condition: Condition,
    },
    Merge {
        table: String,
        records: Vec<Record>,
        key_columns: Vec<String>,
        no_update: bool,
    },
    Execute {
        sql: String,
        values: Vec<Value>,
    },
}

/// Facade over one borrowed client. Not shareable across threads; the
/// pool is the shared object.
pub struct Db {
    client: Client,
    dialect: Dialect,
    fetch_limit: u64,
}

impl Db {
    pub fn new(client: Client, dialect: Dialect, fetch_limit: u64) -> Self {
        Self {
            client,
            dialect,
            fetch_limit,
        }
    }

    pub fn backend(&self) -> BackendType {
        self.client.backend()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn database(&self) -> String {
        self.client.database().to_string()
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Normalize canonical-`?` SQL and binds into the driver's native
    /// placeholder style, or inline everything for drivers without
    /// parameter support.
    pub(crate) fn render(
        &mut self,
        sql: &str,
        params: Params,
    ) -> Result<(String, Params), JrmError> {
        if !self.client.conn().supports_parameters() {
            let inlined = format::inline_sql(&self.dialect, sql, &params)?;
            return Ok((inlined, Params::None));
        }
        placeholder::normalize(sql, params, self.dialect.placeholder_style())
    }

    pub(crate) fn execute_rendered(
        &mut self,
        sql: &str,
        params: Params,
    ) -> Result<u64, JrmError> {
        let (sql, params) = self.render(sql, params)?;
        debug!(sql = %sql, "execute");
        self.client.conn().execute(&sql, &params)
    }

    pub(crate) fn query_rendered(
        &mut self,
        sql: &str,
        params: Params,
        limit: usize,
    ) -> Result<(Vec<String>, Vec<Record>), JrmError> {
        let (sql, params) = self.render(sql, params)?;
        debug!(sql = %sql, "query");
        let conn = self.client.conn();
        let mut cursor = conn.query(&sql, &params)?;
        let columns = cursor.columns().to_vec();
        let rows = cursor.fetch_all(limit)?;
        Ok((columns, rows))
    }

    fn fold(result: Result<DbResult, JrmError>) -> Result<DbResult, JrmError> {
        match result {
            Err(e) if e.is_statement_error() => Ok(DbResult::error(e.to_string())),
            other => other,
        }
    }

    fn delta_guard(&mut self, table: &str) -> Result<(), JrmError> {
        if self.client.backend() == BackendType::Spark {
            crate::spark::ensure_delta(self.client.conn(), table)?;
        }
        Ok(())
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// `SELECT <cols> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]`.
    /// An empty column list selects `*`.
    pub fn select(
        &mut self,
        table: &str,
        columns: impl IntoIterator<Item = impl Into<String>>,
        condition: Condition,
        options: QueryOptions,
    ) -> Result<DbResult, JrmError> {
        let limit = match options.limit {
            None | Some(0) => self.fetch_limit,
            Some(n) => n,
        };
        let result: Result<DbResult, JrmError> = (|| {
            let (sql, binds) = Select::from(table)
                .columns(columns)
                .filter(condition)
                .order_by(options.order_by.clone())
                .limit(Some(limit))
                .to_sql(self.dialect)?;
            let (columns, rows) =
                self.query_rendered(&sql, Params::Positional(binds), limit as usize)?;
            Ok(DbResult::ok_rows(columns, rows))
        })();
        Self::fold(result)
    }

    /// Insert one or many records. Multi-record input is chunked into
    /// `bulk_size` statements; `count` reports the rows sent.
    pub fn insert(
        &mut self,
        table: &str,
        records: Vec<Record>,
        options: InsertOptions,
    ) -> Result<DbResult, JrmError> {
        if records.is_empty() {
            return Ok(DbResult::ok_count(0));
        }
        let result: Result<DbResult, JrmError> = (|| {
            // Single-record path with RETURNING support.
            if records.len() == 1
                && !options.return_columns.is_empty()
                && self.dialect.supports_returning()
            {
                let (sql, binds) = Insert::into(table)
                    .records(records.clone())
                    .returning(options.return_columns.clone())
                    .to_sql(self.dialect)?;
                let (columns, rows) =
                    self.query_rendered(&sql, Params::Positional(binds), usize::MAX)?;
                let mut result = DbResult::ok_rows(columns, rows);
                result.count = 1;
                return Ok(result);
            }

            let bulk_size = options.bulk_size.max(1);
            let total = records.len();
            for chunk in records.chunks(bulk_size) {
                let (sql, binds) = Insert::into(table)
                    .records(chunk.to_vec())
                    .to_sql(self.dialect)?;
                self.execute_rendered(&sql, Params::Positional(binds))?;
            }
            Ok(DbResult::ok_count(total as i64))
        })();
        Self::fold(result)
    }

    /// `UPDATE ... SET ... [WHERE ...]`. An empty condition updates
    /// all rows; that is the caller's responsibility.
    pub fn update(
        &mut self,
        table: &str,
        data: Record,
        condition: Condition,
    ) -> Result<DbResult, JrmError> {
        let result: Result<DbResult, JrmError> = (|| {
            self.delta_guard(table)?;
            let (sql, binds) = Update::table(table)
                .set(data)
                .filter(condition)
                .to_sql(self.dialect)?;
            let count = self.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(DbResult::ok_count(count as i64))
        })();
        Self::fold(result)
    }

    /// `DELETE FROM ... [WHERE ...]`. An empty condition deletes all
    /// rows.
    pub fn delete(&mut self, table: &str, condition: Condition) -> Result<DbResult, JrmError> {
        let result: Result<DbResult, JrmError> = (|| {
            self.delta_guard(table)?;
            let (sql, binds) = Delete::from(table)
                .filter(condition)
                .to_sql(self.dialect)?;
            let count = self.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(DbResult::ok_count(count as i64))
        })();
        Self::fold(result)
    }

    /// Dialect-aware upsert keyed on `key_columns`.
    pub fn merge(
        &mut self,
        table: &str,
        records: Vec<Record>,
        key_columns: Vec<String>,
        options: MergeOptions,
    ) -> Result<DbResult, JrmError> {
        let result: Result<DbResult, JrmError> = (|| {
            self.delta_guard(table)?;
            let mut stmt = Merge::into(table)
                .records(records)
                .keys(key_columns)
                .no_update(options.no_update);
            if let Some(cols) = options.update_columns {
                stmt = stmt.update_columns(cols);
            }
            let (sql, binds) = stmt.to_sql(self.dialect)?;
            let count = self.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(DbResult::ok_count(count as i64))
        })();
        Self::fold(result)
    }

    /// Raw DML/DDL with bound values in any placeholder style.
    pub fn execute(
        &mut self,
        sql: &str,
        values: impl Into<Params>,
    ) -> Result<DbResult, JrmError> {
        let params = values.into();
        let result: Result<DbResult, JrmError> = (|| {
            let count = self.execute_rendered(sql, params)?;
            Ok(DbResult::ok_count(count as i64))
        })();
        Self::fold(result)
    }

    /// Raw SELECT; returns rows up to the configured fetch limit.
    pub fn query(
        &mut self,
        sql: &str,
        values: impl Into<Params>,
    ) -> Result<DbResult, JrmError> {
        let params = values.into();
        let limit = self.fetch_limit as usize;
        let result: Result<DbResult, JrmError> = (|| {
            let (columns, rows) = self.query_rendered(sql, params, limit)?;
            Ok(DbResult::ok_rows(columns, rows))
        })();
        Self::fold(result)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run a closure inside a transaction scope driven by the
    /// [`Transaction`] state machine: autocommit off, the requested
    /// isolation applied, commit on `Ok`, rollback and re-raise on
    /// `Err`. Autocommit is restored either way. On Spark the closure
    /// runs directly; the session has no transactions.
    pub fn transaction<T>(
        &mut self,
        isolation: Option<IsolationLevel>,
        f: impl FnOnce(&mut Db) -> Result<T, JrmError>,
    ) -> Result<T, JrmError> {
        if !self.dialect.supports_transactions() {
            return f(self);
        }

        let dialect = self.dialect;
        let mut tx = Transaction::new();
        tx.begin(self.client.conn(), dialect, isolation)?;

        match f(self) {
            Ok(value) => {
                tx.commit(self.client.conn())?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback(self.client.conn()) {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Apply a sequence of operation descriptors; any statement error
    /// aborts the sequence (and, under `transaction`, rolls it back).
    pub fn apply_batch(&mut self, ops: Vec<BatchOp>) -> Result<Vec<DbResult>, JrmError> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let result = match op {
                BatchOp::Insert { table, records } => {
                    self.insert(&table, records, InsertOptions::default())?
                }
                BatchOp::Update {
                    table,
                    data,
                    condition,
                } => self.update(&table, data, condition)?,
                BatchOp::Delete { table, condition } => self.delete(&table, condition)?,
                BatchOp::Merge {
                    table,
                    records,
                    key_columns,
                    no_update,
                } => self.merge(
                    &table,
                    records,
                    key_columns,
                    MergeOptions {
                        update_columns: None,
                        no_update,
                    },
                )?,
                BatchOp::Execute { sql, values } => self.execute(&sql, values)?,
            };
            if !result.is_ok() {
                return Err(JrmError::Sql(result.message));
            }
            results.push(result);
        }
        Ok(results)
    }
}
