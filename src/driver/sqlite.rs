//! SQLite backend over `rusqlite`.
//!
//! SQLite has no server-side cursors; queries materialize client-side
//! and the cursor serves fetch batches from memory.

use rusqlite::types::{ToSqlOutput, ValueRef};

use super::{positional, BoxConn, BufferedCursor, Connection, Cursor, TxFlags};
use crate::config::connection::BackendType;
use crate::error::JrmError;
use crate::sql::placeholder::Params;
use crate::transaction::IsolationLevel;
use crate::value::{Record, Value};

pub struct SqliteConnection {
    conn: rusqlite::Connection,
    flags: TxFlags,
}

fn sql_err(e: rusqlite::Error) -> JrmError {
    JrmError::Sql(e.to_string())
}

impl SqliteConnection {
    /// Open a database file, or `:memory:`.
    pub fn open(path: &str) -> Result<BoxConn, JrmError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| JrmError::Connect(e.to_string()))?;
        Ok(Box::new(Self {
            conn,
            flags: TxFlags::default(),
        }))
    }

    fn maybe_begin(&mut self) -> Result<(), JrmError> {
        if self.flags.needs_begin() {
            self.conn.execute_batch("BEGIN").map_err(sql_err)?;
            self.flags.tx_open = true;
        }
        Ok(())
    }
}

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sv;
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sv::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sv::Integer(*b as i64)),
            Value::Int(i) => ToSqlOutput::Owned(Sv::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sv::Real(*f)),
            Value::Decimal(d) => ToSqlOutput::Owned(Sv::Text(d.to_string())),
            Value::Text(s) => ToSqlOutput::Owned(Sv::Text(s.clone())),
            Value::Bytes(b) => ToSqlOutput::Owned(Sv::Blob(b.clone())),
            Value::Date(d) => ToSqlOutput::Owned(Sv::Text(d.format("%Y-%m-%d").to_string())),
            Value::Time(t) => ToSqlOutput::Owned(Sv::Text(t.format("%H:%M:%S").to_string())),
            Value::DateTime(dt) => {
                ToSqlOutput::Owned(Sv::Text(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            }
            Value::DateTimeTz(dt) => ToSqlOutput::Owned(Sv::Text(dt.to_rfc3339())),
            // The format layer encodes compounds before binding; this
            // is a fallback for raw-SQL callers.
            Value::Array(_) | Value::Json(_) => {
                ToSqlOutput::Owned(Sv::Text(self.to_json().to_string()))
            }
        })
    }
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl Connection for SqliteConnection {
    fn backend(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn driver_name(&self) -> &'static str {
        "rusqlite"
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, JrmError> {
        self.maybe_begin()?;
        let values = positional(params)?;
        let count = self
            .conn
            .execute(sql, rusqlite::params_from_iter(values.iter()))
            .map_err(sql_err)?;
        Ok(count as u64)
    }

    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &Params,
    ) -> Result<Box<dyn Cursor + 'c>, JrmError> {
        self.maybe_begin()?;
        let values = positional(params)?;
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(values.iter()))
            .map_err(sql_err)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let mut record = Record::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), decode(row.get_ref(idx).map_err(sql_err)?));
            }
            records.push(record);
        }
        Ok(Box::new(BufferedCursor::new(columns, records)))
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), JrmError> {
        // Isolation levels are filtered out upstream for SQLite.
        debug_assert!(isolation.is_none());
        if !self.flags.tx_open {
            self.conn.execute_batch("BEGIN").map_err(sql_err)?;
            self.flags.tx_open = true;
        }
        self.flags.autocommit = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.conn.execute_batch("COMMIT").map_err(sql_err)?;
            self.flags.tx_open = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.conn.execute_batch("ROLLBACK").map_err(sql_err)?;
            self.flags.tx_open = false;
        }
        Ok(())
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), JrmError> {
        if on && self.flags.tx_open {
            self.commit()?;
        }
        self.flags.autocommit = on;
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.flags.autocommit
    }

    fn in_transaction(&self) -> bool {
        self.flags.tx_open
    }

    fn ping(&mut self) -> Result<(), JrmError> {
        self.conn
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| JrmError::Connect(e.to_string()))
    }

    fn server_version(&mut self) -> Result<String, JrmError> {
        Ok(rusqlite::version().to_string())
    }
}
