//! Transaction state machine and isolation levels.
//!
//! States run `Idle → Active → {Committed | RolledBack}`. Beginning a
//! scope switches the connection to autocommit-off and applies the
//! requested isolation level; the terminal transition restores
//! autocommit. The machine holds no connection borrow of its own;
//! callers pass the connection into each transition, which is what
//! lets the Db facade drive the same type while the connection stays
//! usable inside the scope. An abandoned Active scope is cleaned up
//! by the pool's return discipline (rollback + autocommit reset).

use std::fmt;

use tracing::{debug, warn};

use crate::driver::Connection;
use crate::error::JrmError;
use crate::sql::dialect::{Dialect, SqlDialect};

/// Standard isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The SET TRANSACTION spelling.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Parse from the SQL spelling (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, JrmError> {
        match s.trim().to_uppercase().as_str() {
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            other => Err(JrmError::Config(format!("unknown isolation level {other:?}"))),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// Downgrade an isolation request the backend cannot honor, with a
/// warning. Levels the backend cannot apply (SQLite, Spark) proceed
/// at the driver default.
fn effective_isolation(
    dialect: Dialect,
    isolation: Option<IsolationLevel>,
) -> Option<IsolationLevel> {
    match isolation {
        Some(level) if !dialect.supports_isolation(level) => {
            warn!(
                backend = dialect.name(),
                level = %level,
                "isolation level not supported; using driver default"
            );
            None
        }
        other => other,
    }
}

/// The transaction state machine. One instance per scope; the Db
/// facade and [`with_transaction`] both drive this same type.
#[derive(Debug)]
pub struct Transaction {
    state: TxState,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            state: TxState::Idle,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Idle → Active: autocommit off, isolation applied.
    pub fn begin(
        &mut self,
        conn: &mut dyn Connection,
        dialect: Dialect,
        isolation: Option<IsolationLevel>,
    ) -> Result<(), JrmError> {
        if self.state != TxState::Idle {
            return Err(JrmError::Config(format!(
                "cannot begin a transaction from {:?}",
                self.state
            )));
        }
        let isolation = effective_isolation(dialect, isolation);
        conn.set_autocommit(false)?;
        conn.begin(isolation)?;
        self.state = TxState::Active;
        debug!(backend = dialect.name(), "transaction started");
        Ok(())
    }

    /// Active → Committed: driver commit, autocommit restored. The
    /// terminal states accept further commit/rollback calls as no-ops.
    pub fn commit(&mut self, conn: &mut dyn Connection) -> Result<(), JrmError> {
        match self.state {
            TxState::Active => {
                conn.commit()?;
                self.state = TxState::Committed;
                conn.set_autocommit(true)?;
                debug!("transaction committed");
                Ok(())
            }
            TxState::Committed | TxState::RolledBack => Ok(()),
            TxState::Idle => Err(JrmError::Config(
                "cannot commit an idle transaction".into(),
            )),
        }
    }

    /// Active → RolledBack: driver rollback, autocommit restored.
    pub fn rollback(&mut self, conn: &mut dyn Connection) -> Result<(), JrmError> {
        match self.state {
            TxState::Active => {
                conn.rollback()?;
                self.state = TxState::RolledBack;
                conn.set_autocommit(true)?;
                debug!("transaction rolled back");
                Ok(())
            }
            TxState::Committed | TxState::RolledBack => Ok(()),
            TxState::Idle => Err(JrmError::Config(
                "cannot roll back an idle transaction".into(),
            )),
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a closure on a raw connection inside a transaction scope:
/// commit on `Ok`, roll back and re-raise on `Err`.
pub fn with_transaction<T>(
    conn: &mut dyn Connection,
    dialect: Dialect,
    isolation: Option<IsolationLevel>,
    f: impl FnOnce(&mut dyn Connection) -> Result<T, JrmError>,
) -> Result<T, JrmError> {
    let mut tx = Transaction::new();
    tx.begin(conn, dialect, isolation)?;
    match f(conn) {
        Ok(value) => {
            tx.commit(conn)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback(conn) {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
