//! SQL Server dialect.
//!
//! - Bracket identifier quoting (`[ident]`)
//! - `?` positional placeholders
//! - MERGE INTO ... USING (VALUES ...) upserts, semicolon-terminated

use std::fmt::Write as _;

use super::helpers;
use super::{LimitForm, SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;

/// Microsoft SQL Server dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlServer;

impl SqlDialect for SqlServer {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn backend(&self) -> BackendType {
        BackendType::SqlServer
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeValues
    }

    fn merge_requires_terminator(&self) -> bool {
        true
    }

    fn limit_form(&self) -> LimitForm {
        LimitForm::Top
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        if let Some(dsn) = &d.dsn {
            return Ok(dsn.clone());
        }
        d.validate()?;
        let mut dsn = format!("sqlserver://{}:{}", d.host, d.port_or_default());
        let mut params = vec![format!("database={}", d.database)];
        if !d.user.is_empty() {
            params.push(format!("user={}", urlencoding::encode(&d.user)));
            params.push(format!("password={}", urlencoding::encode(&d.password)));
        } else {
            params.push("trusted_connection=true".to_string());
        }
        for (k, v) in &d.options {
            params.push(format!("{k}={v}"));
        }
        let _ = write!(dsn, "?{}", params.join("&"));
        Ok(dsn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trusted_connection_when_no_user() {
        let d = ConnectionDescriptor::new(BackendType::SqlServer, "mssql.host", "crm");
        let dsn = SqlServer.build_dsn(&d).unwrap();
        assert!(dsn.starts_with("sqlserver://mssql.host:1433?database=crm"));
        assert!(dsn.contains("trusted_connection=true"));
    }

    #[test]
    fn credentialed_dsn() {
        let d = ConnectionDescriptor::new(BackendType::SqlServer, "mssql.host", "crm")
            .with_credentials("sa", "Str0ng!");
        let dsn = SqlServer.build_dsn(&d).unwrap();
        assert!(dsn.contains("user=sa"));
        assert!(dsn.contains("password=Str0ng%21"));
    }
}
