//! Spark SQL dialect.
//!
//! - Backtick identifier quoting
//! - No transactions; the session is always effectively autocommit
//! - MERGE INTO requires a Delta target (enforced by the adapter)
//! - Parameter markers only on engine 3.4+; the adapter probes the
//!   session version and inlines values below that

use super::helpers;
use super::{SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;
use crate::transaction::IsolationLevel;

/// Spark SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Spark;

impl SqlDialect for Spark {
    fn name(&self) -> &'static str {
        "spark"
    }

    fn backend(&self) -> BackendType {
        BackendType::Spark
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn supports_transactions(&self) -> bool {
        false
    }

    fn supports_isolation(&self, _level: IsolationLevel) -> bool {
        false
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeValues
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        if let Some(dsn) = &d.dsn {
            return Ok(dsn.clone());
        }
        d.validate()?;
        Ok(helpers::url_dsn("spark", d))
    }
}
