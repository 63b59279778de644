//! SQL dialect descriptors.
//!
//! One immutable descriptor per backend drives everything that differs
//! between engines:
//!
//! - Identifier quoting: `"` (PostgreSQL/SQLite/Oracle/Db2), `` ` ``
//!   (MySQL/Spark), `[]` (SQL Server)
//! - Driver placeholder style: `$1`, `?`, `:1`
//! - Upsert form: ON CONFLICT, ON DUPLICATE KEY, MERGE INTO
//! - Autocommit default and transaction support
//! - Server-side cursor capability for streaming
//! - DSN composition from a connection descriptor
//!
//! Descriptors are `Copy` and freely shared; dispatch reads the
//! backend tag on the client.

pub mod helpers;

mod db2;
mod generic;
mod mysql;
mod oracle;
mod postgres;
mod spark;
mod sqlite;
mod sqlserver;

pub use db2::Db2;
pub use generic::Generic;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use spark::Spark;
pub use sqlite::Sqlite;
pub use sqlserver::SqlServer;

use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;
use crate::sql::placeholder::PlaceholderStyle;
use crate::transaction::IsolationLevel;

/// How a backend caps result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitForm {
    /// `LIMIT n` suffix (PostgreSQL, MySQL, SQLite, Spark).
    Limit,
    /// `FETCH FIRST n ROWS ONLY` suffix (Oracle, Db2).
    FetchFirst,
    /// `SELECT TOP n ...` prefix (SQL Server).
    Top,
}

/// How a backend spells INSERT-or-UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `INSERT ... ON CONFLICT (keys) DO UPDATE SET ...` (PostgreSQL, SQLite).
    OnConflict,
    /// `INSERT ... ON DUPLICATE KEY UPDATE ...` (MySQL/MariaDB).
    OnDuplicateKey,
    /// `MERGE INTO t USING (VALUES ...) AS src ...` (Db2, SQL Server, Spark, generic).
    MergeValues,
    /// `MERGE INTO t USING (SELECT ... FROM DUAL) src ...` (Oracle).
    MergeSelect,
}

/// SQL dialect trait - defines per-backend rendering and capabilities.
///
/// Default implementations follow ANSI SQL; each backend overrides what
/// it must.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// The backend tag this dialect serves.
    fn backend(&self) -> BackendType;

    /// The placeholder style the backend's driver requires.
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Qmark
    }

    /// Quote an identifier (column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    /// Quote a possibly schema-qualified table name.
    fn quote_table(&self, table: &str) -> String {
        helpers::quote_qualified(table, |p| self.quote_identifier(p))
    }

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_single(s)
    }

    /// Format a boolean literal. SQL Server has no boolean literals and
    /// uses `1`/`0`.
    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Whether connections start in autocommit mode.
    fn autocommit_default(&self) -> bool {
        true
    }

    /// Whether the backend has transactions at all. Spark does not;
    /// commit and rollback are no-ops there.
    fn supports_transactions(&self) -> bool {
        true
    }

    /// Whether an explicit isolation level can be applied.
    fn supports_isolation(&self, _level: IsolationLevel) -> bool {
        self.supports_transactions()
    }

    /// Whether INSERT ... RETURNING is available.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Whether the driver accepts bound parameters at all. The Spark
    /// descriptor flips this per session version.
    fn supports_parameters(&self) -> bool {
        true
    }

    /// Whether streaming can use a server-side cursor; otherwise a
    /// client-side fetch loop simulates it.
    fn supports_server_cursors(&self) -> bool {
        false
    }

    /// Upsert rendering family.
    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeValues
    }

    /// Result-cap syntax.
    fn limit_form(&self) -> LimitForm {
        LimitForm::Limit
    }

    /// Whether MERGE statements need a terminating semicolon.
    fn merge_requires_terminator(&self) -> bool {
        false
    }

    /// Compose a DSN from descriptor parts. Credentials are URL-encoded.
    /// An explicit `dsn` on the descriptor always wins.
    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError>;
}

/// Supported SQL dialects, one per backend tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    Postgres,
    MySql,
    #[default]
    Sqlite,
    Oracle,
    Db2,
    SqlServer,
    Spark,
    Generic,
}

impl Dialect {
    /// Descriptor for a backend tag.
    pub fn for_backend(backend: BackendType) -> Dialect {
        match backend {
            BackendType::Postgres => Dialect::Postgres,
            BackendType::MySql => Dialect::MySql,
            BackendType::Sqlite => Dialect::Sqlite,
            BackendType::Oracle => Dialect::Oracle,
            BackendType::Db2 => Dialect::Db2,
            BackendType::SqlServer => Dialect::SqlServer,
            BackendType::Spark => Dialect::Spark,
            BackendType::Generic => Dialect::Generic,
        }
    }

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::Oracle => &Oracle,
            Dialect::Db2 => &Db2,
            Dialect::SqlServer => &SqlServer,
            Dialect::Spark => &Spark,
            Dialect::Generic => &Generic,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn backend(&self) -> BackendType {
        self.dialect().backend()
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.dialect().placeholder_style()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_table(&self, table: &str) -> String {
        self.dialect().quote_table(table)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn autocommit_default(&self) -> bool {
        self.dialect().autocommit_default()
    }

    fn supports_transactions(&self) -> bool {
        self.dialect().supports_transactions()
    }

    fn supports_isolation(&self, level: IsolationLevel) -> bool {
        self.dialect().supports_isolation(level)
    }

    fn supports_returning(&self) -> bool {
        self.dialect().supports_returning()
    }

    fn supports_parameters(&self) -> bool {
        self.dialect().supports_parameters()
    }

    fn supports_server_cursors(&self) -> bool {
        self.dialect().supports_server_cursors()
    }

    fn upsert_style(&self) -> UpsertStyle {
        self.dialect().upsert_style()
    }

    fn limit_form(&self) -> LimitForm {
        self.dialect().limit_form()
    }

    fn merge_requires_terminator(&self) -> bool {
        self.dialect().merge_requires_terminator()
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        self.dialect().build_dsn(d)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
