//! MySQL / MariaDB backend over the `mysql` crate.
//!
//! MySQL result sets buffer client-side; streaming is simulated by
//! fetch batches from the buffered cursor.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Timelike};
use mysql::prelude::Queryable;

use super::{positional, BoxConn, BufferedCursor, Connection, Cursor, TxFlags};
use crate::config::connection::BackendType;
use crate::error::JrmError;
use crate::sql::placeholder::Params;
use crate::transaction::IsolationLevel;
use crate::value::{Record, Value};

pub struct MysqlConnection {
    conn: mysql::Conn,
    flags: TxFlags,
}

fn sql_err(e: mysql::Error) -> JrmError {
    JrmError::Sql(e.to_string())
}

fn to_driver(value: &Value) -> mysql::Value {
    use mysql::Value as Mv;
    match value {
        Value::Null => Mv::NULL,
        Value::Bool(b) => Mv::Int(*b as i64),
        Value::Int(i) => Mv::Int(*i),
        Value::Float(f) => Mv::Double(*f),
        Value::Decimal(d) => Mv::Bytes(d.to_string().into_bytes()),
        Value::Text(s) => Mv::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => Mv::Bytes(b.clone()),
        Value::Date(d) => {
            use chrono::Datelike;
            Mv::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
        }
        Value::Time(t) => Mv::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            0,
        ),
        Value::DateTime(dt) => {
            use chrono::Datelike;
            Mv::Date(
                dt.year() as u16,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
                dt.and_utc().timestamp_subsec_micros(),
            )
        }
        Value::DateTimeTz(dt) => Mv::Bytes(dt.to_rfc3339().into_bytes()),
        Value::Array(_) | Value::Json(_) => Mv::Bytes(value.to_json().to_string().into_bytes()),
    }
}

fn from_driver(value: &mysql::Value) -> Value {
    use mysql::Value as Mv;
    match value {
        Mv::NULL => Value::Null,
        Mv::Int(i) => Value::Int(*i),
        Mv::UInt(u) => Value::Int(*u as i64),
        Mv::Float(f) => Value::Float(*f as f64),
        Mv::Double(f) => Value::Float(*f),
        Mv::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(b.clone()),
        },
        Mv::Date(y, mo, d, h, mi, s, micro) => {
            let date = NaiveDate::from_ymd_opt(*y as i32, *mo as u32, *d as u32);
            match date {
                Some(date) if *h == 0 && *mi == 0 && *s == 0 && *micro == 0 => Value::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(*h as u32, *mi as u32, *s as u32, *micro)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        Mv::Time(_neg, _days, h, mi, s, micro) => {
            NaiveTime::from_hms_micro_opt(*h as u32, *mi as u32, *s as u32, *micro)
                .map(Value::Time)
                .unwrap_or(Value::Null)
        }
    }
}

fn driver_params(params: &Params) -> Result<mysql::Params, JrmError> {
    let values = positional(params)?;
    if values.is_empty() {
        Ok(mysql::Params::Empty)
    } else {
        Ok(mysql::Params::Positional(
            values.iter().map(to_driver).collect(),
        ))
    }
}

impl MysqlConnection {
    /// Connect with the given DSN, applying a connect timeout.
    pub fn connect(dsn: &str, connect_timeout: Duration) -> Result<BoxConn, JrmError> {
        let opts = mysql::Opts::from_url(dsn).map_err(|e| JrmError::Config(e.to_string()))?;
        let opts = mysql::OptsBuilder::from_opts(opts)
            .tcp_connect_timeout(Some(connect_timeout));
        let conn = mysql::Conn::new(opts).map_err(|e| JrmError::Connect(e.to_string()))?;
        Ok(Box::new(Self {
            conn,
            flags: TxFlags::default(),
        }))
    }

    fn maybe_begin(&mut self) -> Result<(), JrmError> {
        if self.flags.needs_begin() {
            self.conn.query_drop("START TRANSACTION").map_err(sql_err)?;
            self.flags.tx_open = true;
        }
        Ok(())
    }
}

impl Connection for MysqlConnection {
    fn backend(&self) -> BackendType {
        BackendType::MySql
    }

    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, JrmError> {
        self.maybe_begin()?;
        self.conn
            .exec_drop(sql, driver_params(params)?)
            .map_err(sql_err)?;
        Ok(self.conn.affected_rows())
    }

    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &Params,
    ) -> Result<Box<dyn Cursor + 'c>, JrmError> {
        self.maybe_begin()?;
        let mut result = self
            .conn
            .exec_iter(sql, driver_params(params)?)
            .map_err(sql_err)?;
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut records = Vec::new();
        for row in result.by_ref() {
            let row = row.map_err(sql_err)?;
            let mut record = Record::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row.as_ref(idx).map(from_driver).unwrap_or(Value::Null);
                record.insert(name.clone(), value);
            }
            records.push(record);
        }
        drop(result);
        Ok(Box::new(BufferedCursor::new(columns, records)))
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), JrmError> {
        if !self.flags.tx_open {
            if let Some(level) = isolation {
                self.conn
                    .query_drop(format!("SET TRANSACTION ISOLATION LEVEL {level}"))
                    .map_err(sql_err)?;
            }
            self.conn.query_drop("START TRANSACTION").map_err(sql_err)?;
            self.flags.tx_open = true;
        }
        self.flags.autocommit = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.conn.query_drop("COMMIT").map_err(sql_err)?;
            self.flags.tx_open = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.conn.query_drop("ROLLBACK").map_err(sql_err)?;
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
            .query_drop("SELECT 1")
            .map_err(|e| JrmError::Connect(e.to_string()))
    }

    fn server_version(&mut self) -> Result<String, JrmError> {
        let version: Option<String> = self
            .conn
            .query_first("SELECT VERSION()")
            .map_err(sql_err)?;
        Ok(version.unwrap_or_default())
    }
}
