//! Spark SQL / Delta Lake adapter.
//!
//! Translates the same surface onto a session-based engine. The
//! session has no transactions, so commit and rollback are no-ops;
//! UPDATE, DELETE and MERGE require the target to be a Delta table.
//! Parameter markers are used when the probed engine version is 3.4 or
//! newer; below that, values are inlined with single-quote doubling by
//! the facade (the connection reports `supports_parameters` = false).

use tracing::debug;

use crate::config::connection::BackendType;
use crate::driver::{BoxConn, BufferedCursor, Connection, Cursor};
use crate::error::JrmError;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::placeholder::Params;
use crate::transaction::IsolationLevel;
use crate::value::{Record, Value};

/// A collected query result: column names plus row tuples.
#[derive(Debug, Clone, Default)]
pub struct SparkFrame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SparkFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> (Vec<String>, Vec<Record>) {
        let columns = self.columns;
        let records = self
            .rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<Record>()
            })
            .collect();
        (columns, records)
    }
}

/// The session surface the adapter drives. Implementations wrap
/// whatever transport reaches the engine (Thrift, Spark Connect, a
/// local shell); `sql` collects a bounded result eagerly, and
/// streaming iterates that local buffer partition by partition.
pub trait SparkSession: Send {
    /// Run a statement and collect its (possibly empty) result.
    fn sql(&mut self, query: &str) -> Result<SparkFrame, JrmError>;

    /// Run a parameterized statement (`?` markers). Only called when
    /// the probed engine version supports parameters.
    fn sql_with_params(&mut self, query: &str, params: &[Value]) -> Result<SparkFrame, JrmError> {
        let _ = (query, params);
        Err(JrmError::Unsupported {
            backend: "spark",
            operation: "parameterized sql",
        })
    }

    /// Engine version string, e.g. `3.5.1`.
    fn version(&mut self) -> Result<String, JrmError>;
}

/// Parse `major.minor` off a Spark version string.
pub fn parse_version(version: &str) -> (u32, u32) {
    let mut parts = version.trim().split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    let minor = parts
        .next()
        .and_then(|p| {
            p.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok()
        })
        .unwrap_or(0);
    (major, minor)
}

/// [`Connection`] over a Spark session.
pub struct SparkConnection {
    session: Box<dyn SparkSession>,
    version: String,
    supports_params: bool,
}

impl SparkConnection {
    /// Wrap a session, probing the engine version once.
    pub fn new(mut session: Box<dyn SparkSession>) -> Result<BoxConn, JrmError> {
        let version = session.version()?;
        let supports_params = parse_version(&version) >= (3, 4);
        debug!(version = %version, supports_params, "spark session ready");
        Ok(Box::new(Self {
            session,
            version,
            supports_params,
        }))
    }
}

impl Connection for SparkConnection {
    fn backend(&self) -> BackendType {
        BackendType::Spark
    }

    fn driver_name(&self) -> &'static str {
        "spark"
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, JrmError> {
        let values = crate::driver::positional(params)?;
        if values.is_empty() {
            self.session.sql(sql)?;
        } else {
            self.session.sql_with_params(sql, values)?;
        }
        // The session reports no affected-row count.
        Ok(0)
    }

    fn query<'c>(
        &'c mut self,
        sql: &str,
        params: &Params,
    ) -> Result<Box<dyn Cursor + 'c>, JrmError> {
        let values = crate::driver::positional(params)?;
        let frame = if values.is_empty() {
            self.session.sql(sql)?
        } else {
            self.session.sql_with_params(sql, values)?
        };
        let (columns, records) = frame.into_records();
        Ok(Box::new(BufferedCursor::new(columns, records)))
    }

    fn begin(&mut self, _isolation: Option<IsolationLevel>) -> Result<(), JrmError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), JrmError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), JrmError> {
        Ok(())
    }

    fn set_autocommit(&mut self, _on: bool) -> Result<(), JrmError> {
        Ok(())
    }

    fn autocommit(&self) -> bool {
        true
    }

    fn in_transaction(&self) -> bool {
        false
    }

    fn ping(&mut self) -> Result<(), JrmError> {
        self.session
            .sql("SELECT 1")
            .map(|_| ())
            .map_err(|e| JrmError::Connect(e.to_string()))
    }

    fn server_version(&mut self) -> Result<String, JrmError> {
        Ok(self.version.clone())
    }

    fn supports_parameters(&self) -> bool {
        self.supports_params
    }
}

/// Check that `table` is a Delta table; mutations require it.
pub fn ensure_delta(conn: &mut dyn Connection, table: &str) -> Result<(), JrmError> {
    let sql = format!("DESCRIBE DETAIL {}", Dialect::Spark.quote_table(table));
    let mut cursor = conn.query(&sql, &Params::None)?;
    let row = cursor.next_row()?;
    let format = row
        .as_ref()
        .and_then(|r| r.get("format"))
        .and_then(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .unwrap_or_default()
        .to_string();
    if format.eq_ignore_ascii_case("delta") {
        Ok(())
    } else {
        Err(JrmError::DeltaRequired(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted in-memory session.
    pub(crate) struct MockSession {
        pub version: String,
        pub delta_tables: Vec<String>,
        pub log: Vec<String>,
    }

    impl MockSession {
        pub fn new(version: &str) -> Self {
            Self {
                version: version.into(),
                delta_tables: Vec::new(),
                log: Vec::new(),
            }
        }
    }

    impl SparkSession for MockSession {
        fn sql(&mut self, query: &str) -> Result<SparkFrame, JrmError> {
            self.log.push(query.to_string());
            if let Some(rest) = query.strip_prefix("DESCRIBE DETAIL ") {
                let table = rest.trim_matches('`').to_string();
                let format = if self.delta_tables.contains(&table) {
                    "delta"
                } else {
                    "parquet"
                };
                return Ok(SparkFrame {
                    columns: vec!["format".into()],
                    rows: vec![vec![Value::Text(format.into())]],
                });
            }
            Ok(SparkFrame::empty())
        }

        fn sql_with_params(
            &mut self,
            query: &str,
            params: &[Value],
        ) -> Result<SparkFrame, JrmError> {
            self.log.push(format!("{query} /* {} params */", params.len()));
            Ok(SparkFrame::empty())
        }

        fn version(&mut self) -> Result<String, JrmError> {
            Ok(self.version.clone())
        }
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("3.4.1"), (3, 4));
        assert_eq!(parse_version("3.3.0-amzn-1"), (3, 3));
        assert_eq!(parse_version("4.0"), (4, 0));
        assert_eq!(parse_version("garbage"), (0, 0));
    }

    #[test]
    fn parameter_support_follows_version() {
        let conn = SparkConnection::new(Box::new(MockSession::new("3.4.0"))).unwrap();
        assert!(conn.supports_parameters());
        let conn = SparkConnection::new(Box::new(MockSession::new("3.3.2"))).unwrap();
        assert!(!conn.supports_parameters());
    }

    #[test]
    fn commit_and_rollback_are_noops() {
        let mut conn = SparkConnection::new(Box::new(MockSession::new("3.5.0"))).unwrap();
        conn.begin(None).unwrap();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert!(conn.autocommit());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn delta_guard() {
        let mut session = MockSession::new("3.5.0");
        session.delta_tables.push("events".into());
        let mut conn = SparkConnection::new(Box::new(session)).unwrap();
        ensure_delta(conn.as_mut(), "events").unwrap();
        match ensure_delta(conn.as_mut(), "plain_parquet") {
            Err(JrmError::DeltaRequired(t)) => assert_eq!(t, "plain_parquet"),
            other => panic!("expected DeltaRequired, got {other:?}"),
        }
    }
}
