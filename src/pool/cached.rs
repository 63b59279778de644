//! Reset-on-return pool backend.
//!
//! A soft pool: checkout reuses an idle connection when one exists and
//! opens a new one otherwise. On return, any open transaction is
//! rolled back and autocommit is restored before the connection goes
//! back on the shelf; connections beyond `max_cached` are closed.
//!
//! A private in-memory SQLite database lives inside the connection
//! that opened it. This backend reuses its shelf serially, but a
//! checkout while the shelf is empty opens a new, empty database; for
//! such descriptors under concurrency use the eager backend, which
//! clamps to a single connection, or a file path.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::connect::Connector;
use crate::driver::BoxConn;
use crate::error::JrmError;

pub struct CachedPool {
    connector: Connector,
    idle: Mutex<VecDeque<BoxConn>>,
    max_cached: usize,
}

impl CachedPool {
    pub fn new(connector: Connector, max_cached: usize) -> Self {
        Self {
            connector,
            idle: Mutex::new(VecDeque::new()),
            max_cached,
        }
    }

    /// Check a connection out, opening a fresh one when the shelf is
    /// empty.
    pub fn get(&self) -> Result<BoxConn, JrmError> {
        let reused = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            idle.pop_front()
        };
        match reused {
            Some(mut conn) => {
                if conn.ping().is_ok() {
                    debug!("reusing cached connection");
                    Ok(conn)
                } else {
                    debug!("cached connection went stale; reconnecting");
                    self.connector.connect()
                }
            }
            None => self.connector.connect(),
        }
    }

    /// Return a connection, resetting it to a clean autocommit state.
    pub fn put(&self, mut conn: BoxConn) {
        if conn.in_transaction() {
            if let Err(e) = conn.rollback() {
                warn!(error = %e, "rollback on pool return failed; dropping connection");
                return;
            }
        }
        if let Err(e) = conn.set_autocommit(true) {
            warn!(error = %e, "autocommit reset on pool return failed; dropping connection");
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < self.max_cached {
            idle.push_back(conn);
        }
        // Overflow connections fall out of scope and close.
    }

    /// Drop all idle connections.
    pub fn dispose(&self) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.clear();
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::config::connection::ConnectionDescriptor;
    use std::time::Duration;

    fn pool(max_cached: usize) -> CachedPool {
        let connector = Connector::new(
            ConnectionDescriptor::sqlite(":memory:"),
            Duration::from_secs(5),
        )
        .unwrap();
        CachedPool::new(connector, max_cached)
    }

    #[test]
    fn reuse_and_cap() {
        let pool = pool(1);
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        pool.put(a);
        pool.put(b); // over the cap, dropped
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn return_resets_transaction_state() {
        let pool = pool(1);
        let mut conn = pool.get().unwrap();
        conn.begin(None).unwrap();
        assert!(conn.in_transaction());
        pool.put(conn);

        let conn = pool.get().unwrap();
        assert!(!conn.in_transaction());
        assert!(conn.autocommit());
    }

    #[test]
    fn dispose_clears_shelf() {
        let pool = pool(2);
        let a = pool.get().unwrap();
        pool.put(a);
        assert_eq!(pool.idle_count(), 1);
        pool.dispose();
        assert_eq!(pool.idle_count(), 0);
    }
}
