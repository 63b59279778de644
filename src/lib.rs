//! # longjrm
//!
//! Multi-backend relational data access through one uniform,
//! data-structure-driven surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           JrmConfig (connection descriptors)             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [connector factory]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Pool (eager / reset-on-return backends)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │ acquire()
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   Client  {connection, backend, database, driver}        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [Db facade]
//! ┌─────────────────────────────────────────────────────────┐
//! │  select / insert / update / delete / merge / execute     │
//! │  query / stream_* / load / transactions                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [dialect descriptors + builders]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Dialect-correct SQL + bound parameter vector        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are insertion-ordered maps from column name to [`Value`];
//! conditions are structured trees compiled per dialect; every
//! operation returns the standardized [`DbResult`] envelope.
//!
//! ## Example
//!
//! ```
//! use longjrm::config::{ConnectionDescriptor, JrmConfig};
//! use longjrm::pool::Pool;
//! use longjrm::record;
//! use longjrm::sql::Condition;
//!
//! # fn main() -> Result<(), longjrm::JrmError> {
//! let config = JrmConfig::single("mem", ConnectionDescriptor::sqlite(":memory:"));
//! let pool = Pool::from_config(&config, None)?;
//! let mut db = pool.db()?;
//!
//! db.execute("CREATE TABLE users (id INTEGER, name TEXT)", vec![])?;
//! db.insert("users", vec![record! { "id" => 1, "name" => "ada" }], Default::default())?;
//! let result = db.select(
//!     "users",
//!     ["id", "name"],
//!     Condition::new().eq("id", 1),
//!     Default::default(),
//! )?;
//! assert_eq!(result.count, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connect;
pub mod db;
pub mod driver;
pub mod error;
pub mod load;
pub mod partition;
pub mod pool;
pub mod spark;
pub mod sql;
pub mod sqlfile;
pub mod stream;
pub mod transaction;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{BackendType, ConnectionDescriptor, JrmConfig, PoolBackend};
    pub use crate::connect::Connector;
    pub use crate::db::{BatchOp, Db, DbResult, InsertOptions, MergeOptions, QueryOptions};
    pub use crate::driver::{BoxConn, Connection, Cursor};
    pub use crate::error::{JrmError, JrmResult};
    pub use crate::load::{LoadMode, LoadSource, SourceType};
    pub use crate::pool::{Client, Pool};
    pub use crate::spark::{SparkConnection, SparkFrame, SparkSession};
    pub use crate::sql::{Condition, Dialect, Params, PlaceholderStyle, SqlDialect};
    pub use crate::stream::{CsvOptions, RowStatus, StreamWriteOptions};
    pub use crate::transaction::{IsolationLevel, TxState};
    pub use crate::value::{Record, Value};
}

// Also export the workhorses at the crate root
pub use db::{Db, DbResult};
pub use error::{JrmError, JrmResult};
pub use pool::Pool;
pub use sql::{Condition, Dialect};
pub use value::{Record, Value};
