//! Driver abstraction.
//!
//! [`Connection`] and [`Cursor`] are the crate's cursor-based driver
//! API. The bundled backends (feature-gated: `sqlite`, `postgres`,
//! `mysql`) implement them over the corresponding driver crates; any
//! other engine can participate by implementing them; that is the
//! `generic` backend.
//!
//! SQL arriving at a connection is already in the driver's native
//! placeholder style with a matching values container; normalization
//! happens in the facade.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::io;

use crate::config::connection::BackendType;
use crate::error::JrmError;
use crate::sql::placeholder::Params;
use crate::transaction::IsolationLevel;
use crate::value::Record;

/// A live, single-threaded database connection.
///
/// Implementations keep the unified autocommit discipline: with
/// autocommit off, a transaction opens lazily before the next
/// statement; `commit`/`rollback` close it; switching autocommit back
/// on commits any open transaction.
pub trait Connection: Send {
    fn backend(&self) -> BackendType;

    /// Informational driver name (`rusqlite`, `postgres`, ...).
    fn driver_name(&self) -> &'static str;

    /// Execute a statement, returning the affected-row count.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, JrmError>;

    /// Run a query and return a cursor over its rows.
    fn query<'c>(&'c mut self, sql: &str, params: &Params)
        -> Result<Box<dyn Cursor + 'c>, JrmError>;

    /// Open a transaction, optionally applying an isolation level.
    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), JrmError>;

    fn commit(&mut self) -> Result<(), JrmError>;

    fn rollback(&mut self) -> Result<(), JrmError>;

    /// Toggle autocommit. Turning it on commits any open transaction.
    fn set_autocommit(&mut self, on: bool) -> Result<(), JrmError>;

    fn autocommit(&self) -> bool;

    /// Whether a transaction is currently open.
    fn in_transaction(&self) -> bool;

    /// Cheap liveness probe, used by the pool before checkout.
    fn ping(&mut self) -> Result<(), JrmError>;

    /// Server version string, where the driver exposes one.
    fn server_version(&mut self) -> Result<String, JrmError> {
        Ok(String::new())
    }

    /// Whether the driver accepts bound parameters. Spark sessions
    /// below 3.4 answer false and get values inlined by the facade.
    fn supports_parameters(&self) -> bool {
        true
    }

    /// Bulk ingestion endpoint (PostgreSQL `COPY ... FROM STDIN`).
    fn copy_in(&mut self, _sql: &str, _data: &mut dyn io::Read) -> Result<u64, JrmError> {
        Err(JrmError::Unsupported {
            backend: self.backend().as_str(),
            operation: "copy_in",
        })
    }
}

/// Boxed connection handed around by the pool.
pub type BoxConn = Box<dyn Connection>;

/// A cursor over a result set.
///
/// Backends with server-side cursors stream row by row; the rest
/// materialize client-side and serve from memory, which callers cannot
/// observe beyond memory use.
pub trait Cursor {
    /// Column names, available before the first row.
    fn columns(&self) -> &[String];

    /// Fetch the next row.
    fn next_row(&mut self) -> Result<Option<Record>, JrmError>;

    /// Fetch up to `n` rows; an empty vector means exhaustion.
    fn fetch_many(&mut self, n: usize) -> Result<Vec<Record>, JrmError> {
        let mut rows = Vec::with_capacity(n.min(1024));
        while rows.len() < n {
            match self.next_row()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    /// Drain the cursor up to `cap` rows.
    fn fetch_all(&mut self, cap: usize) -> Result<Vec<Record>, JrmError> {
        self.fetch_many(cap)
    }

    /// Whether rows are streamed from the server rather than a local
    /// buffer.
    fn server_side(&self) -> bool {
        false
    }
}

/// Shared autocommit/transaction bookkeeping for driver impls.
#[derive(Debug, Clone, Copy)]
pub struct TxFlags {
    pub autocommit: bool,
    pub tx_open: bool,
}

impl Default for TxFlags {
    fn default() -> Self {
        Self {
            autocommit: true,
            tx_open: false,
        }
    }
}

impl TxFlags {
    /// Whether a statement about to run must first open a transaction.
    pub fn needs_begin(&self) -> bool {
        !self.autocommit && !self.tx_open
    }
}

/// An eagerly materialized cursor, used by backends without streaming
/// result sets and by the Spark adapter.
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Record>,
}

impl BufferedCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

impl Cursor for BufferedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Record>, JrmError> {
        Ok(self.rows.pop_front())
    }
}

/// Require a positional values container; the bundled drivers are all
/// positional-native.
pub fn positional(params: &Params) -> Result<&[crate::value::Value], JrmError> {
    match params {
        Params::None => Ok(&[]),
        Params::Positional(values) => Ok(values),
        Params::Named(_) => Err(JrmError::MalformedBinding(
            "driver requires positional parameters".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn buffered_cursor_serves_rows_in_order() {
        let mut cur = BufferedCursor::new(
            vec!["id".into()],
            vec![record! { "id" => 1 }, record! { "id" => 2 }],
        );
        assert_eq!(cur.columns(), ["id".to_string()]);
        assert_eq!(cur.next_row().unwrap().unwrap()["id"], crate::value::Value::Int(1));
        let rest = cur.fetch_many(10).unwrap();
        assert_eq!(rest.len(), 1);
        assert!(cur.next_row().unwrap().is_none());
    }

    #[test]
    fn tx_flags_lazy_begin() {
        let mut flags = TxFlags::default();
        assert!(!flags.needs_begin());
        flags.autocommit = false;
        assert!(flags.needs_begin());
        flags.tx_open = true;
        assert!(!flags.needs_begin());
    }
}
