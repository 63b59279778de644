//! Eager pool backend over `r2d2`.
//!
//! Pre-allocates `min_pool_size` connections, probes liveness before
//! checkout, recycles idle connections, and blocks up to the pool
//! timeout when exhausted.
//!
//! A private in-memory SQLite database exists only inside the one
//! connection that opened it, so for such descriptors the pool is
//! clamped to a single connection; checkouts then serialize on it
//! instead of being handed fresh, empty databases.

use tracing::warn;

use crate::config::settings::JrmConfig;
use crate::connect::Connector;
use crate::driver::BoxConn;
use crate::error::JrmError;

/// r2d2 glue: how to open, validate, and retire connections.
pub struct ConnManager {
    connector: Connector,
}

impl ConnManager {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }
}

impl r2d2::ManageConnection for ConnManager {
    type Connection = BoxConn;
    type Error = JrmError;

    fn connect(&self) -> Result<BoxConn, JrmError> {
        self.connector.connect()
    }

    fn is_valid(&self, conn: &mut BoxConn) -> Result<(), JrmError> {
        conn.ping()
    }

    fn has_broken(&self, _conn: &mut BoxConn) -> bool {
        false
    }
}

pub struct EagerPool {
    pool: r2d2::Pool<ConnManager>,
}

impl EagerPool {
    pub fn new(connector: Connector, config: &JrmConfig) -> Result<Self, JrmError> {
        let mut max_size = config.max_pool_size.max(1);
        if connector.descriptor().is_private_memory_sqlite() {
            if max_size > 1 {
                warn!(
                    "in-memory SQLite database is private to one connection; \
                     clamping pool to a single connection"
                );
            }
            max_size = 1;
        }
        let min_idle = config.min_pool_size.min(max_size);
        let pool = r2d2::Pool::builder()
            .min_idle(Some(min_idle))
            .max_size(max_size)
            .connection_timeout(config.pool_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .test_on_check_out(true)
            .build(ConnManager::new(connector))
            .map_err(|e| JrmError::Connect(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Check a connection out, blocking up to the pool timeout.
    pub fn get(&self) -> Result<r2d2::PooledConnection<ConnManager>, JrmError> {
        self.pool
            .get()
            .map_err(|e| JrmError::PoolExhausted(e.to_string()))
    }
}
