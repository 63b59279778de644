//! Connection pool facade.
//!
//! Two backends behind one surface: an eager pool (r2d2) and a
//! reset-on-return cached pool. The facade enforces the autocommit
//! discipline: a connection handed out has autocommit on unless
//! inside a transaction scope, and goes back clean on every exit
//! path, so the backends never see a dirty return.

pub mod cached;
pub mod eager;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::connection::BackendType;
use crate::config::settings::{JrmConfig, PoolBackend};
use crate::connect::Connector;
use crate::db::{BatchOp, Db, DbResult};
use crate::driver::{BoxConn, Connection};
use crate::error::JrmError;
use crate::sql::dialect::Dialect;
use crate::transaction::IsolationLevel;

use cached::CachedPool;
use eager::{ConnManager, EagerPool};

enum PoolInner {
    Eager(EagerPool),
    Cached(Arc<CachedPool>),
}

/// Shared, thread-safe pool over one connection descriptor.
pub struct Pool {
    inner: PoolInner,
    dialect: Dialect,
    backend: BackendType,
    database: String,
    fetch_limit: u64,
}

impl Pool {
    /// Build a pool for a named connection from the config provider.
    pub fn from_config(config: &JrmConfig, name: Option<&str>) -> Result<Self, JrmError> {
        let descriptor = config.connection(name)?.clone();
        let connector = Connector::new(descriptor, config.connect_timeout())?;
        Self::with_connector(connector, config)
    }

    /// Build a pool over an explicit connector (custom factories for
    /// non-bundled backends come in this way).
    pub fn with_connector(connector: Connector, config: &JrmConfig) -> Result<Self, JrmError> {
        let dialect = connector.dialect();
        let backend = connector.backend();
        let database = connector.database().to_string();
        let inner = match config.pool_backend {
            PoolBackend::Eager => PoolInner::Eager(EagerPool::new(connector, config)?),
            PoolBackend::Cached => {
                PoolInner::Cached(Arc::new(CachedPool::new(connector, config.max_cached)))
            }
        };
        Ok(Self {
            inner,
            dialect,
            backend,
            database,
            fetch_limit: config.fetch_limit,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Borrow a client; the connection returns to the pool when the
    /// client drops, on success and failure alike.
    pub fn acquire(&self) -> Result<Client, JrmError> {
        let conn = match &self.inner {
            PoolInner::Eager(pool) => PooledConn {
                inner: PooledInner::Eager(pool.get()?),
            },
            PoolInner::Cached(pool) => PooledConn {
                inner: PooledInner::Cached {
                    conn: Some(pool.get()?),
                    pool: Arc::clone(pool),
                },
            },
        };
        debug!(backend = %self.backend, "connection checked out");
        Ok(Client {
            driver: conn.driver_name(),
            conn,
            backend: self.backend,
            database: self.database.clone(),
        })
    }

    /// Borrow a client wrapped in the Db facade.
    pub fn db(&self) -> Result<Db, JrmError> {
        Ok(Db::new(self.acquire()?, self.dialect, self.fetch_limit))
    }

    /// Run a closure inside a transaction scope on a pooled
    /// connection: autocommit off for the scope, commit on `Ok`,
    /// rollback and re-raise on `Err`, autocommit restored before the
    /// connection returns.
    pub fn transaction<T>(
        &self,
        isolation: Option<IsolationLevel>,
        f: impl FnOnce(&mut Db) -> Result<T, JrmError>,
    ) -> Result<T, JrmError> {
        let mut db = self.db()?;
        db.transaction(isolation, f)
    }

    /// Run a sequence of operation descriptors atomically in one
    /// transaction.
    pub fn execute_batch(
        &self,
        ops: Vec<BatchOp>,
        isolation: Option<IsolationLevel>,
    ) -> Result<Vec<DbResult>, JrmError> {
        self.transaction(isolation, |db| db.apply_batch(ops))
    }

    /// Drop idle connections. Outstanding clients keep working and
    /// their connections are discarded on return.
    pub fn dispose(&self) {
        if let PoolInner::Cached(pool) = &self.inner {
            pool.dispose();
        }
        // The eager backend manages its own lifecycle; dropping the
        // Pool closes it.
    }
}

enum PooledInner {
    Eager(r2d2::PooledConnection<ConnManager>),
    Cached {
        conn: Option<BoxConn>,
        pool: Arc<CachedPool>,
    },
}

/// Guard over a checked-out connection. Dereferences to
/// [`Connection`]; returning to the pool happens on drop.
pub struct PooledConn {
    inner: PooledInner,
}

impl Deref for PooledConn {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match &self.inner {
            PooledInner::Eager(conn) => &***conn,
            PooledInner::Cached { conn, .. } => {
                &**conn.as_ref().expect("connection already returned")
            }
        }
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.inner {
            PooledInner::Eager(conn) => &mut ***conn,
            PooledInner::Cached { conn, .. } => {
                &mut **conn.as_mut().expect("connection already returned")
            }
        }
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        match &mut self.inner {
            PooledInner::Eager(conn) => {
                // r2d2 takes the connection back on drop; make sure it
                // goes back clean.
                if conn.in_transaction() {
                    if let Err(e) = conn.rollback() {
                        warn!(error = %e, "rollback on pool return failed");
                    }
                }
                if let Err(e) = conn.set_autocommit(true) {
                    warn!(error = %e, "autocommit reset on pool return failed");
                }
            }
            PooledInner::Cached { conn, pool } => {
                if let Some(conn) = conn.take() {
                    pool.put(conn);
                }
            }
        }
    }
}

/// The borrowed bundle every operation works through: a live
/// connection plus the identifiers dispatch reads. Single-threaded by
/// contract; the pool itself is the shared object.
pub struct Client {
    conn: PooledConn,
    backend: BackendType,
    database: String,
    driver: &'static str,
}

impl Client {
    pub fn backend(&self) -> BackendType {
        self.backend
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Informational driver name.
    pub fn driver_name(&self) -> &'static str {
        self.driver
    }

    pub fn conn(&mut self) -> &mut dyn Connection {
        &mut *self.conn
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::config::connection::ConnectionDescriptor;

    fn config(backend: PoolBackend) -> JrmConfig {
        let mut config =
            JrmConfig::single("mem", ConnectionDescriptor::sqlite(":memory:"));
        config.pool_backend = backend;
        config.min_pool_size = 1;
        config.max_pool_size = 2;
        config
    }

    #[test]
    fn acquire_yields_clean_client() {
        for backend in [PoolBackend::Eager, PoolBackend::Cached] {
            let pool = Pool::from_config(&config(backend), None).unwrap();
            let mut client = pool.acquire().unwrap();
            assert_eq!(client.backend(), BackendType::Sqlite);
            assert_eq!(client.driver_name(), "rusqlite");
            assert!(client.conn().autocommit());
            assert!(!client.conn().in_transaction());
        }
    }

    #[test]
    fn dirty_client_returns_clean() {
        let pool = Pool::from_config(&config(PoolBackend::Cached), None).unwrap();
        {
            let mut client = pool.acquire().unwrap();
            client.conn().begin(None).unwrap();
            assert!(client.conn().in_transaction());
        }
        let mut client = pool.acquire().unwrap();
        assert!(!client.conn().in_transaction());
        assert!(client.conn().autocommit());
    }
}
