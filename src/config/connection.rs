//! Connection descriptors and backend tags.
//!
//! A descriptor carries everything needed to open one database
//! connection: the backend tag, host/port/credentials, and either a
//! full DSN or enough parts to compose one. The JSON wire format is
//! normative:
//!
//! ```json
//! { "type": "postgres",
//!   "host": "db.internal", "port": 5432,
//!   "user": "app", "password": "secret",
//!   "database": "orders",
//!   "options": { "sslmode": "require" } }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JrmError;

/// Supported database backends.
///
/// Unknown tags parse to [`BackendType::Generic`], which drives the
/// fallback dialect (positional `?` placeholders, MERGE-style upsert).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    Postgres,
    MySql,
    Sqlite,
    Oracle,
    Db2,
    SqlServer,
    Spark,
    Generic,
}

impl BackendType {
    /// Parse a backend tag. Aliases follow the wire format:
    /// `postgres`/`postgresql`, `mysql`/`mariadb`, `sqlserver`/`mssql`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => BackendType::Postgres,
            "mysql" | "mariadb" => BackendType::MySql,
            "sqlite" | "sqlite3" => BackendType::Sqlite,
            "oracle" => BackendType::Oracle,
            "db2" | "ibm_db2" => BackendType::Db2,
            "sqlserver" | "mssql" | "sql_server" => BackendType::SqlServer,
            "spark" | "sparksql" => BackendType::Spark,
            _ => BackendType::Generic,
        }
    }

    /// Canonical tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Postgres => "postgres",
            BackendType::MySql => "mysql",
            BackendType::Sqlite => "sqlite",
            BackendType::Oracle => "oracle",
            BackendType::Db2 => "db2",
            BackendType::SqlServer => "sqlserver",
            BackendType::Spark => "spark",
            BackendType::Generic => "generic",
        }
    }

    /// Default server port, 0 where not applicable.
    pub fn default_port(&self) -> u16 {
        match self {
            BackendType::Postgres => 5432,
            BackendType::MySql => 3306,
            BackendType::Sqlite => 0,
            BackendType::Oracle => 1521,
            BackendType::Db2 => 50000,
            BackendType::SqlServer => 1433,
            BackendType::Spark => 10000,
            BackendType::Generic => 0,
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(BackendType::parse(&s))
    }
}

impl Serialize for BackendType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Everything needed to open one connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionDescriptor {
    /// Backend tag.
    #[serde(rename = "type")]
    pub backend: BackendType,

    #[serde(default)]
    pub host: String,

    /// Server port; backend default applies when absent.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database name, or the file path for SQLite.
    #[serde(default)]
    pub database: String,

    /// Optional full DSN. When present it wins over the composed parts.
    #[serde(default)]
    pub dsn: Option<String>,

    /// Free-form driver options, appended to the DSN query string.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    /// Minimal descriptor from backend + host + database.
    pub fn new(
        backend: BackendType,
        host: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            host: host.into(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: database.into(),
            dsn: None,
            options: BTreeMap::new(),
        }
    }

    /// Descriptor for a SQLite file or `:memory:`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        let mut d = Self::new(BackendType::Sqlite, "", "");
        d.database = path.into();
        d
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Effective port (explicit or backend default).
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Whether this describes a private in-memory SQLite database.
    /// Such a database is visible only to the one connection that
    /// opened it, so pooling must not hand out siblings.
    pub fn is_private_memory_sqlite(&self) -> bool {
        if self.backend != BackendType::Sqlite {
            return false;
        }
        let target = self.dsn.as_deref().unwrap_or(&self.database);
        if target.is_empty() || target == ":memory:" {
            return true;
        }
        target.contains("mode=memory") && !target.contains("cache=shared")
    }

    /// Check the descriptor invariant: either a DSN or enough parts to
    /// compose one.
    pub fn validate(&self) -> Result<(), JrmError> {
        if self.dsn.is_some() {
            return Ok(());
        }
        match self.backend {
            BackendType::Sqlite => {
                if self.database.is_empty() {
                    Err(JrmError::Config(
                        "sqlite descriptor needs a database path".into(),
                    ))
                } else {
                    Ok(())
                }
            }
            _ => {
                if self.host.is_empty() || self.database.is_empty() {
                    Err(JrmError::Config(format!(
                        "{} descriptor needs host and database, or a dsn",
                        self.backend
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Parse a descriptor from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, JrmError> {
        let d: ConnectionDescriptor = serde_json::from_str(json)?;
        d.validate()?;
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parsing() {
        assert_eq!(BackendType::parse("postgresql"), BackendType::Postgres);
        assert_eq!(BackendType::parse("mariadb"), BackendType::MySql);
        assert_eq!(BackendType::parse("MSSQL"), BackendType::SqlServer);
        assert_eq!(BackendType::parse("spark"), BackendType::Spark);
        assert_eq!(BackendType::parse("who-knows"), BackendType::Generic);
    }

    #[test]
    fn wire_format_round_trip() {
        let json = r#"{
            "type": "postgres",
            "host": "db.internal", "port": 5433,
            "user": "app", "password": "secret",
            "database": "orders",
            "options": { "sslmode": "require" }
        }"#;
        let d = ConnectionDescriptor::from_json(json).unwrap();
        assert_eq!(d.backend, BackendType::Postgres);
        assert_eq!(d.port_or_default(), 5433);
        assert_eq!(d.options.get("sslmode").map(String::as_str), Some("require"));
    }

    #[test]
    fn missing_parts_rejected() {
        let d = ConnectionDescriptor::new(BackendType::MySql, "", "shop");
        assert!(d.validate().is_err());

        let mut d = ConnectionDescriptor::new(BackendType::MySql, "", "");
        d.dsn = Some("mysql://u:p@h/shop".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn private_memory_sqlite_detection() {
        assert!(ConnectionDescriptor::sqlite(":memory:").is_private_memory_sqlite());
        assert!(ConnectionDescriptor::sqlite("").is_private_memory_sqlite());
        assert!(
            ConnectionDescriptor::sqlite("file:one?mode=memory").is_private_memory_sqlite()
        );
        assert!(!ConnectionDescriptor::sqlite("file:one?mode=memory&cache=shared")
            .is_private_memory_sqlite());
        assert!(!ConnectionDescriptor::sqlite("/data/app.db").is_private_memory_sqlite());
        assert!(!ConnectionDescriptor::new(BackendType::Postgres, "h", ":memory:")
            .is_private_memory_sqlite());
    }

    #[test]
    fn default_ports() {
        assert_eq!(BackendType::Postgres.default_port(), 5432);
        assert_eq!(BackendType::Db2.default_port(), 50000);
        assert_eq!(BackendType::Sqlite.default_port(), 0);
    }
}
