//! SQLite dialect.
//!
//! - ANSI identifier quoting
//! - `?` positional placeholders
//! - ON CONFLICT upserts (3.24+)
//! - No SET TRANSACTION ISOLATION; explicit levels are ignored with a
//!   warning and the driver default applies

use super::{SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;
use crate::transaction::IsolationLevel;

/// SQLite dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn backend(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn supports_isolation(&self, _level: IsolationLevel) -> bool {
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        if let Some(dsn) = &d.dsn {
            return Ok(dsn.clone());
        }
        d.validate()?;
        // The DSN is the file path, or :memory:.
        Ok(if d.database.is_empty() {
            ":memory:".to_string()
        } else {
            d.database.clone()
        })
    }
}
