//! IBM Db2 dialect.
//!
//! - ANSI identifier quoting
//! - `?` positional placeholders
//! - MERGE INTO ... USING (VALUES ...) upserts
//! - LOAD bulk loads through ADMIN_CMD
//! - Range partition DDL (ATTACH/DETACH PARTITION)

use std::fmt::Write as _;

use super::{LimitForm, SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;

/// IBM Db2 dialect.
#[derive(Debug, Clone, Copy)]
pub struct Db2;

impl SqlDialect for Db2 {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn backend(&self) -> BackendType {
        BackendType::Db2
    }

    fn supports_server_cursors(&self) -> bool {
        true
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeValues
    }

    fn limit_form(&self) -> LimitForm {
        LimitForm::FetchFirst
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        if let Some(dsn) = &d.dsn {
            return Ok(dsn.clone());
        }
        d.validate()?;
        // Keyword form understood by the Db2 CLI driver.
        let mut dsn = format!(
            "DATABASE={};HOSTNAME={};PORT={};PROTOCOL=TCPIP;",
            d.database,
            d.host,
            d.port_or_default()
        );
        if !d.user.is_empty() {
            let _ = write!(dsn, "UID={};PWD={};", d.user, d.password);
        }
        for (k, v) in &d.options {
            let _ = write!(dsn, "{}={};", k.to_uppercase(), v);
        }
        Ok(dsn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_dsn() {
        let d = ConnectionDescriptor::new(BackendType::Db2, "db2.host", "WH")
            .with_credentials("loader", "pw");
        assert_eq!(
            Db2.build_dsn(&d).unwrap(),
            "DATABASE=WH;HOSTNAME=db2.host;PORT=50000;PROTOCOL=TCPIP;UID=loader;PWD=pw;"
        );
    }
}
