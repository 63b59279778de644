//! Db2 range-partition management.
//!
//! Attach, detach, add, and drop partitions on Db2 range-partitioned
//! tables. Partition bounds are inlined as literals; Db2 does not
//! accept parameter markers in partition DDL.

use tracing::debug;

use crate::config::connection::BackendType;
use crate::db::{Db, DbResult};
use crate::error::JrmError;
use crate::sql::dialect::SqlDialect;
use crate::sql::format;
use crate::sql::placeholder::Params;
use crate::value::Value;

impl Db {
    fn require_db2(&self, operation: &'static str) -> Result<(), JrmError> {
        if self.backend() != BackendType::Db2 {
            return Err(JrmError::Unsupported {
                backend: self.backend().as_str(),
                operation,
            });
        }
        Ok(())
    }

    fn partition_ddl(&mut self, sql: String) -> Result<DbResult, JrmError> {
        debug!(sql = %sql, "partition ddl");
        match self.execute_rendered(&sql, Params::None) {
            Ok(_) => Ok(DbResult::ok_count(0)),
            Err(e) if e.is_statement_error() => Ok(DbResult::error(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Roll a staged table in as a new partition:
    /// `ALTER TABLE t ATTACH PARTITION p STARTING (..) ENDING (..) FROM s`.
    pub fn attach_partition(
        &mut self,
        table: &str,
        partition: &str,
        starting: Value,
        ending: Value,
        source_table: &str,
    ) -> Result<DbResult, JrmError> {
        self.require_db2("attach_partition")?;
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} ATTACH PARTITION {} STARTING ({}) ENDING ({}) FROM {}",
            dialect.quote_table(table),
            dialect.quote_identifier(partition),
            format::inline_value(&dialect, &starting)?,
            format::inline_value(&dialect, &ending)?,
            dialect.quote_table(source_table),
        );
        self.partition_ddl(sql)
    }

    /// Roll a partition out into its own table:
    /// `ALTER TABLE t DETACH PARTITION p INTO tgt`.
    pub fn detach_partition(
        &mut self,
        table: &str,
        partition: &str,
        target_table: &str,
    ) -> Result<DbResult, JrmError> {
        self.require_db2("detach_partition")?;
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} DETACH PARTITION {} INTO {}",
            dialect.quote_table(table),
            dialect.quote_identifier(partition),
            dialect.quote_table(target_table),
        );
        self.partition_ddl(sql)
    }

    /// Add an empty partition for a new range.
    pub fn add_partition(
        &mut self,
        table: &str,
        partition: &str,
        starting: Value,
        ending: Value,
    ) -> Result<DbResult, JrmError> {
        self.require_db2("add_partition")?;
        let dialect = self.dialect();
        let sql = format!(
            "ALTER TABLE {} ADD PARTITION {} STARTING ({}) ENDING ({})",
            dialect.quote_table(table),
            dialect.quote_identifier(partition),
            format::inline_value(&dialect, &starting)?,
            format::inline_value(&dialect, &ending)?,
        );
        self.partition_ddl(sql)
    }

    /// Drop a partition: detach it into a scratch table, then drop the
    /// scratch table.
    pub fn drop_partition(
        &mut self,
        table: &str,
        partition: &str,
    ) -> Result<DbResult, JrmError> {
        self.require_db2("drop_partition")?;
        let scratch = format!("{}_{}_detached", table.replace('.', "_"), partition);
        let detach = self.detach_partition(table, partition, &scratch)?;
        if !detach.is_ok() {
            return Ok(detach);
        }
        let dialect = self.dialect();
        self.partition_ddl(format!("DROP TABLE {}", dialect.quote_table(&scratch)))
    }
}
