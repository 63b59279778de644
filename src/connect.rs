//! Connector factory.
//!
//! Maps a connection descriptor to a live [`Connection`]: picks the
//! dialect, composes the DSN, applies the connect timeout, and
//! constructs the bundled driver for the backend. Backends without a
//! bundled driver (Oracle, Db2, SQL Server, Spark, generic) connect
//! through a caller-supplied factory over the same driver traits.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::driver::BoxConn;
use crate::error::JrmError;
use crate::sql::dialect::{Dialect, SqlDialect};

/// Caller-supplied connection factory for non-bundled backends.
pub type ConnectFn =
    dyn Fn(&ConnectionDescriptor, Duration) -> Result<BoxConn, JrmError> + Send + Sync;

/// Everything needed to open (and re-open) connections for one
/// descriptor. Cloneable and shared by the pool backends.
#[derive(Clone)]
pub struct Connector {
    descriptor: ConnectionDescriptor,
    dialect: Dialect,
    connect_timeout: Duration,
    factory: Option<Arc<ConnectFn>>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("backend", &self.descriptor.backend)
            .field("host", &self.descriptor.host)
            .field("database", &self.descriptor.database)
            .finish()
    }
}

impl Connector {
    /// Build a connector for a descriptor, validating it.
    pub fn new(
        descriptor: ConnectionDescriptor,
        connect_timeout: Duration,
    ) -> Result<Self, JrmError> {
        descriptor.validate()?;
        let dialect = Dialect::for_backend(descriptor.backend);
        Ok(Self {
            descriptor,
            dialect,
            connect_timeout,
            factory: None,
        })
    }

    /// Attach a factory for backends without a bundled driver.
    pub fn with_factory(
        mut self,
        factory: impl Fn(&ConnectionDescriptor, Duration) -> Result<BoxConn, JrmError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn backend(&self) -> BackendType {
        self.descriptor.backend
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn database(&self) -> &str {
        &self.descriptor.database
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Open one live connection.
    pub fn connect(&self) -> Result<BoxConn, JrmError> {
        if let Some(factory) = &self.factory {
            debug!(backend = %self.descriptor.backend, "connecting via custom factory");
            return factory(&self.descriptor, self.connect_timeout);
        }

        let dsn = self.dialect.build_dsn(&self.descriptor)?;
        debug!(
            backend = %self.descriptor.backend,
            host = %self.descriptor.host,
            database = %self.descriptor.database,
            "opening connection"
        );

        match self.descriptor.backend {
            #[cfg(feature = "sqlite")]
            BackendType::Sqlite => crate::driver::sqlite::SqliteConnection::open(&dsn),
            #[cfg(feature = "postgres")]
            BackendType::Postgres => {
                crate::driver::postgres::PostgresConnection::connect(&dsn, self.connect_timeout)
            }
            #[cfg(feature = "mysql")]
            BackendType::MySql => {
                crate::driver::mysql::MysqlConnection::connect(&dsn, self.connect_timeout)
            }
            other => Err(JrmError::Config(format!(
                "no bundled driver for backend {other}; enable the matching \
                 cargo feature or attach a connector factory"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_descriptor_rejected_up_front() {
        let d = ConnectionDescriptor::new(BackendType::Postgres, "", "");
        assert!(Connector::new(d, Duration::from_secs(5)).is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_in_memory_connects() {
        let d = ConnectionDescriptor::sqlite(":memory:");
        let connector = Connector::new(d, Duration::from_secs(5)).unwrap();
        let mut conn = connector.connect().unwrap();
        conn.ping().unwrap();
        assert_eq!(conn.backend(), BackendType::Sqlite);
    }

    #[test]
    fn missing_driver_reports_config_error() {
        let mut d = ConnectionDescriptor::new(BackendType::Generic, "", "");
        d.dsn = Some("whatever://".into());
        let connector = Connector::new(d, Duration::from_secs(5)).unwrap();
        assert!(matches!(connector.connect(), Err(JrmError::Config(_))));
    }

    #[test]
    fn custom_factory_is_used() {
        use crate::driver::{BufferedCursor, Connection, Cursor, TxFlags};
        use crate::sql::placeholder::Params;
        use crate::transaction::IsolationLevel;

        struct FakeConn(TxFlags);
        impl Connection for FakeConn {
            fn backend(&self) -> BackendType {
                BackendType::Generic
            }
            fn driver_name(&self) -> &'static str {
                "fake"
            }
            fn execute(&mut self, _sql: &str, _params: &Params) -> Result<u64, JrmError> {
                Ok(0)
            }
            fn query<'c>(
                &'c mut self,
                _sql: &str,
                _params: &Params,
            ) -> Result<Box<dyn Cursor + 'c>, JrmError> {
                Ok(Box::new(BufferedCursor::new(vec![], vec![])))
            }
            fn begin(&mut self, _isolation: Option<IsolationLevel>) -> Result<(), JrmError> {
                self.0.tx_open = true;
                Ok(())
            }
            fn commit(&mut self) -> Result<(), JrmError> {
                self.0.tx_open = false;
                Ok(())
            }
            fn rollback(&mut self) -> Result<(), JrmError> {
                self.0.tx_open = false;
                Ok(())
            }
            fn set_autocommit(&mut self, on: bool) -> Result<(), JrmError> {
                self.0.autocommit = on;
                Ok(())
            }
            fn autocommit(&self) -> bool {
                self.0.autocommit
            }
            fn in_transaction(&self) -> bool {
                self.0.tx_open
            }
            fn ping(&mut self) -> Result<(), JrmError> {
                Ok(())
            }
        }

        let mut d = ConnectionDescriptor::new(BackendType::Generic, "", "");
        d.dsn = Some("custom://".into());
        let connector = Connector::new(d, Duration::from_secs(5))
            .unwrap()
            .with_factory(|_, _| Ok(Box::new(FakeConn(TxFlags::default())) as BoxConn));
        let conn = connector.connect().unwrap();
        assert_eq!(conn.driver_name(), "fake");
    }
}
