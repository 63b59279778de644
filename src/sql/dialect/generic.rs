//! Generic fallback dialect.
//!
//! Chosen when no specific descriptor matches a backend tag. Assumes a
//! conservative driver: `?` positional placeholders, ANSI quoting, and
//! the MERGE-style upsert template. The descriptor must carry a full
//! DSN; there is nothing to compose from parts for an unknown driver.

use super::{SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;

/// Fallback dialect for drivers without a specific descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Generic;

impl SqlDialect for Generic {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn backend(&self) -> BackendType {
        BackendType::Generic
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeValues
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        d.dsn.clone().ok_or_else(|| {
            JrmError::Config("generic backend requires an explicit dsn".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_is_required() {
        let d = ConnectionDescriptor::new(BackendType::Generic, "h", "db");
        assert!(Generic.build_dsn(&d).is_err());
    }
}
