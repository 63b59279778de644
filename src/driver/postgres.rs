//! PostgreSQL backend over the `postgres` crate.
//!
//! Queries stream through `query_raw`, so large result sets never
//! materialize client-side. `copy_in` maps to COPY ... FROM STDIN.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use postgres::fallible_iterator::FallibleIterator;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, RowIter};
use rust_decimal::Decimal;

use super::{positional, BoxConn, Connection, Cursor, TxFlags};
use crate::config::connection::BackendType;
use crate::error::JrmError;
use crate::sql::placeholder::Params;
use crate::transaction::IsolationLevel;
use crate::value::{Record, Value};

pub struct PostgresConnection {
    client: Client,
    flags: TxFlags,
}

fn sql_err(e: postgres::Error) -> JrmError {
    JrmError::Sql(e.to_string())
}

impl PostgresConnection {
    /// Connect with the given DSN, applying a connect timeout.
    pub fn connect(dsn: &str, connect_timeout: Duration) -> Result<BoxConn, JrmError> {
        let mut config: postgres::Config = dsn
            .parse()
            .map_err(|e: postgres::Error| JrmError::Config(e.to_string()))?;
        config.connect_timeout(connect_timeout);
        let client = config
            .connect(NoTls)
            .map_err(|e| JrmError::Connect(e.to_string()))?;
        Ok(Box::new(Self {
            client,
            flags: TxFlags::default(),
        }))
    }

    fn maybe_begin(&mut self) -> Result<(), JrmError> {
        if self.flags.needs_begin() {
            self.client.batch_execute("BEGIN").map_err(sql_err)?;
            self.flags.tx_open = true;
        }
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(i) => match ty.name() {
                "int2" => (*i as i16).to_sql(ty, out),
                "int4" => (*i as i32).to_sql(ty, out),
                "float4" => (*i as f32).to_sql(ty, out),
                "float8" => (*i as f64).to_sql(ty, out),
                "numeric" => Decimal::from(*i).to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Float(f) => match ty.name() {
                "float4" => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Decimal(d) => d.to_sql(ty, out),
            Value::Text(s) => s.to_sql(ty, out),
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Date(d) => d.to_sql(ty, out),
            Value::Time(t) => t.to_sql(ty, out),
            Value::DateTime(dt) => dt.to_sql(ty, out),
            Value::DateTimeTz(dt) => dt.to_sql(ty, out),
            Value::Array(_) | Value::Json(_) => self.to_json().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn decode(row: &postgres::Row, idx: usize) -> Result<Value, JrmError> {
    let ty = row.columns()[idx].type_();
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx).map_err(sql_err)?.map(Value::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(sql_err)?
            .map(|v| Value::Int(v as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(sql_err)?
            .map(|v| Value::Int(v as i64)),
        "int8" => row.try_get::<_, Option<i64>>(idx).map_err(sql_err)?.map(Value::Int),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(sql_err)?
            .map(|v| Value::Float(v as f64)),
        "float8" => row.try_get::<_, Option<f64>>(idx).map_err(sql_err)?.map(Value::Float),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)
            .map_err(sql_err)?
            .map(Value::Decimal),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .map_err(sql_err)?
            .map(Value::Bytes),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(sql_err)?
            .map(Value::Date),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)
            .map_err(sql_err)?
            .map(Value::Time),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(sql_err)?
            .map(Value::DateTime),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(sql_err)?
            .map(Value::DateTimeTz),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(sql_err)?
            .map(Value::Json),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(sql_err)?
            .map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

struct PgCursor<'c> {
    iter: RowIter<'c>,
    columns: Vec<String>,
}

impl Cursor for PgCursor<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Record>, JrmError> {
        match self.iter.next().map_err(sql_err)? {
            None => Ok(None),
            Some(row) => {
                let mut record = Record::new();
                for (idx, name) in self.columns.iter().enumerate() {
                    record.insert(name.clone(), decode(&row, idx)?);
                }
                Ok(Some(record))
            }
        }
    }

    fn server_side(&self) -> bool {
        true
    }
}

impl Connection for PostgresConnection {
    fn backend(&self) -> BackendType {
        BackendType::Postgres
    }

    fn driver_name(&self) -> &'static str {
        "postgres"
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, JrmError> {
        self.maybe_begin()?;
        let values = positional(params)?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        self.client.execute(sql, &refs).map_err(sql_err)
    }

    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &Params,
    ) -> Result<Box<dyn Cursor + 'c>, JrmError> {
        self.maybe_begin()?;
        let values = positional(params)?.to_vec();
        let stmt = self.client.prepare(sql).map_err(sql_err)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
        let iter = self
            .client
            .query_raw(&stmt, values.iter().map(|v| v as &dyn ToSql))
            .map_err(sql_err)?;
        Ok(Box::new(PgCursor { iter, columns }))
    }

    fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<(), JrmError> {
        if !self.flags.tx_open {
            self.client.batch_execute("BEGIN").map_err(sql_err)?;
            if let Some(level) = isolation {
                self.client
                    .batch_execute(&format!("SET TRANSACTION ISOLATION LEVEL {level}"))
                    .map_err(sql_err)?;
            }
            self.flags.tx_open = true;
        }
        self.flags.autocommit = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.client.batch_execute("COMMIT").map_err(sql_err)?;
            self.flags.tx_open = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), JrmError> {
        if self.flags.tx_open {
            self.client.batch_execute("ROLLBACK").map_err(sql_err)?;
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
        self.client
            .is_valid(Duration::from_secs(2))
            .map_err(|e| JrmError::Connect(e.to_string()))
    }

    fn server_version(&mut self) -> Result<String, JrmError> {
        let row = self
            .client
            .query_one("SHOW server_version", &[])
            .map_err(sql_err)?;
        row.try_get::<_, String>(0).map_err(sql_err)
    }

    fn copy_in(&mut self, sql: &str, data: &mut dyn io::Read) -> Result<u64, JrmError> {
        self.maybe_begin()?;
        let mut writer = self.client.copy_in(sql).map_err(sql_err)?;
        io::copy(data, &mut writer)?;
        writer.finish().map_err(sql_err)
    }
}
