//! Oracle dialect.
//!
//! - ANSI identifier quoting
//! - `:1` numbered placeholders
//! - MERGE INTO ... USING (SELECT ... FROM DUAL) upserts
//! - Server-side cursors
//! - READ COMMITTED and SERIALIZABLE isolation only

use super::{LimitForm, SqlDialect, UpsertStyle};
use crate::config::connection::{BackendType, ConnectionDescriptor};
use crate::error::JrmError;
use crate::sql::placeholder::PlaceholderStyle;
use crate::transaction::IsolationLevel;

/// Oracle dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn backend(&self) -> BackendType {
        BackendType::Oracle
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::NumberedColon
    }

    fn supports_server_cursors(&self) -> bool {
        true
    }

    fn supports_isolation(&self, level: IsolationLevel) -> bool {
        matches!(
            level,
            IsolationLevel::ReadCommitted | IsolationLevel::Serializable
        )
    }

    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::MergeSelect
    }

    fn limit_form(&self) -> LimitForm {
        LimitForm::FetchFirst
    }

    fn build_dsn(&self, d: &ConnectionDescriptor) -> Result<String, JrmError> {
        if let Some(dsn) = &d.dsn {
            return Ok(dsn.clone());
        }
        d.validate()?;
        // EZConnect form: user/password@//host:port/service
        Ok(format!(
            "{}/{}@//{}:{}/{}",
            urlencoding::encode(&d.user),
            urlencoding::encode(&d.password),
            d.host,
            d.port_or_default(),
            d.database
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ezconnect_dsn() {
        let d = ConnectionDescriptor::new(BackendType::Oracle, "ora.host", "XEPDB1")
            .with_credentials("scott", "tiger");
        assert_eq!(
            Oracle.build_dsn(&d).unwrap(),
            "scott/tiger@//ora.host:1521/XEPDB1"
        );
    }

    #[test]
    fn isolation_subset() {
        assert!(Oracle.supports_isolation(IsolationLevel::ReadCommitted));
        assert!(Oracle.supports_isolation(IsolationLevel::Serializable));
        assert!(!Oracle.supports_isolation(IsolationLevel::RepeatableRead));
    }
}
