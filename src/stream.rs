//! Streaming engine.
//!
//! Row-by-row and batch iteration over large result sets, periodic-
//! commit stream writers, and CSV export. Streams are finite,
//! non-restartable iterators yielding tagged elements; backends with
//! server-side cursors stream from the server, the rest simulate with
//! client-side fetch batches.

use std::path::Path;

use tracing::{debug, warn};

use crate::db::Db;
use crate::driver::Cursor;
use crate::error::JrmError;
use crate::sql::build::{Merge, Update};
use crate::sql::condition::Condition;
use crate::sql::format;
use crate::sql::placeholder::Params;
use crate::sql::dialect::SqlDialect;
use crate::value::{Record, Value};

/// Status tag on a streamed element.
#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    Ok,
    /// This element failed to decode; the stream continues.
    Error(String),
    /// Terminal element: the error budget is spent and the stream ends.
    Aborted(String),
}

/// One element of a row stream.
#[derive(Debug, Clone)]
pub struct StreamedRow {
    pub index: u64,
    pub record: Option<Record>,
    pub status: RowStatus,
}

/// One element of a batch stream.
#[derive(Debug, Clone)]
pub struct StreamedBatch {
    /// Cumulative row count including this batch.
    pub count: u64,
    pub records: Vec<Record>,
    pub status: RowStatus,
}

fn budget_spent(errors: u64, max_errors: i64) -> bool {
    match max_errors {
        0 => false,
        n if n < 0 => true,
        n => errors >= n as u64,
    }
}

/// Lazy row stream over an open cursor.
pub struct StreamQuery<'c> {
    cursor: Box<dyn Cursor + 'c>,
    columns: Vec<String>,
    index: u64,
    errors: u64,
    max_errors: i64,
    done: bool,
}

impl StreamQuery<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for StreamQuery<'_> {
    type Item = StreamedRow;

    fn next(&mut self) -> Option<StreamedRow> {
        if self.done {
            return None;
        }
        match self.cursor.next_row() {
            Ok(Some(record)) => {
                let index = self.index;
                self.index += 1;
                Some(StreamedRow {
                    index,
                    record: Some(record),
                    status: RowStatus::Ok,
                })
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.errors += 1;
                let index = self.index;
                self.index += 1;
                if budget_spent(self.errors, self.max_errors) {
                    self.done = true;
                    Some(StreamedRow {
                        index,
                        record: None,
                        status: RowStatus::Aborted(e.to_string()),
                    })
                } else {
                    Some(StreamedRow {
                        index,
                        record: None,
                        status: RowStatus::Error(e.to_string()),
                    })
                }
            }
        }
    }
}

/// Lazy batch stream over an open cursor.
pub struct StreamQueryBatch<'c> {
    cursor: Box<dyn Cursor + 'c>,
    columns: Vec<String>,
    batch_size: usize,
    count: u64,
    errors: u64,
    max_errors: i64,
    done: bool,
}

impl StreamQueryBatch<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for StreamQueryBatch<'_> {
    type Item = StreamedBatch;

    fn next(&mut self) -> Option<StreamedBatch> {
        if self.done {
            return None;
        }
        match self.cursor.fetch_many(self.batch_size) {
            Ok(records) if records.is_empty() => {
                self.done = true;
                None
            }
            Ok(records) => {
                self.count += records.len() as u64;
                Some(StreamedBatch {
                    count: self.count,
                    records,
                    status: RowStatus::Ok,
                })
            }
            Err(e) => {
                self.errors += 1;
                if budget_spent(self.errors, self.max_errors) {
                    self.done = true;
                    Some(StreamedBatch {
                        count: self.count,
                        records: Vec::new(),
                        status: RowStatus::Aborted(e.to_string()),
                    })
                } else {
                    Some(StreamedBatch {
                        count: self.count,
                        records: Vec::new(),
                        status: RowStatus::Error(e.to_string()),
                    })
                }
            }
        }
    }
}

/// Knobs shared by the stream writers.
#[derive(Debug, Clone)]
pub struct StreamWriteOptions {
    /// Commit after this many written rows.
    pub commit_every: u64,
    /// 0 = unlimited tolerance, negative = abort on first error,
    /// positive = abort when the count is reached.
    pub max_errors: i64,
}

impl Default for StreamWriteOptions {
    fn default() -> Self {
        Self {
            commit_every: 10_000,
            max_errors: 0,
        }
    }
}

/// Outcome of a stream write.
#[derive(Debug, Clone)]
pub struct StreamWriteReport {
    /// Rows written (committed or pending at completion).
    pub processed: u64,
    pub errors: u64,
    /// True when the error budget ended the stream early; the
    /// uncommitted window was rolled back.
    pub aborted: bool,
    pub message: String,
}

/// CSV export options.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub header: bool,
    /// Literal written for NULL (default: empty string).
    pub null_value: String,
    /// Force-quote every field with this character when set.
    pub quote_char: Option<u8>,
    /// Rows between flushes.
    pub batch_size: usize,
    /// Stop at the first row error instead of skipping.
    pub abort_on_error: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            header: true,
            null_value: String::new(),
            quote_char: None,
            batch_size: 1000,
            abort_on_error: false,
        }
    }
}

impl Db {
    /// Lazy row stream for a query. Elements carry `(index, record,
    /// status)`; after the error budget is spent a terminal `Aborted`
    /// element ends the stream.
    pub fn stream_query<'c>(
        &'c mut self,
        sql: &str,
        values: impl Into<Params>,
        max_errors: i64,
    ) -> Result<StreamQuery<'c>, JrmError> {
        let (sql, params) = self.render(sql, values.into())?;
        debug!(sql = %sql, "stream query");
        let cursor = self.client().conn().query(&sql, &params)?;
        let columns = cursor.columns().to_vec();
        Ok(StreamQuery {
            cursor,
            columns,
            index: 0,
            errors: 0,
            max_errors,
            done: false,
        })
    }

    /// Batch stream: yields `(cumulative_count, records, status)`.
    pub fn stream_query_batch<'c>(
        &'c mut self,
        sql: &str,
        values: impl Into<Params>,
        batch_size: usize,
        max_errors: i64,
    ) -> Result<StreamQueryBatch<'c>, JrmError> {
        let (sql, params) = self.render(sql, values.into())?;
        debug!(sql = %sql, batch_size, "stream query batch");
        let cursor = self.client().conn().query(&sql, &params)?;
        let columns = cursor.columns().to_vec();
        Ok(StreamQueryBatch {
            cursor,
            columns,
            batch_size: batch_size.max(1),
            count: 0,
            errors: 0,
            max_errors,
            done: false,
        })
    }

    fn stream_write<I>(
        &mut self,
        items: I,
        options: &StreamWriteOptions,
        mut write_one: impl FnMut(&mut Db, I::Item) -> Result<(), JrmError>,
    ) -> Result<StreamWriteReport, JrmError>
    where
        I: Iterator,
    {
        let transactional = self.dialect().supports_transactions();
        if transactional {
            let conn = self.client().conn();
            conn.set_autocommit(false)?;
            conn.begin(None)?;
        }
        let commit_every = options.commit_every.max(1);
        let mut processed: u64 = 0;
        let mut window: u64 = 0;
        let mut errors: u64 = 0;

        for item in items {
            match write_one(self, item) {
                Ok(()) => {
                    processed += 1;
                    window += 1;
                    if transactional && window >= commit_every {
                        self.client().conn().commit()?;
                        debug!(processed, "periodic commit");
                        window = 0;
                    }
                }
                Err(e) if e.is_statement_error() => {
                    errors += 1;
                    warn!(error = %e, errors, "stream write row failed");
                    if budget_spent(errors, options.max_errors) {
                        // Roll back the uncommitted window and stop.
                        if transactional {
                            let conn = self.client().conn();
                            conn.rollback()?;
                            conn.set_autocommit(true)?;
                        }
                        return Ok(StreamWriteReport {
                            processed: processed - window.min(processed),
                            errors,
                            aborted: true,
                            message: e.to_string(),
                        });
                    }
                }
                Err(e) => {
                    if transactional {
                        let conn = self.client().conn();
                        let _ = conn.rollback();
                        let _ = conn.set_autocommit(true);
                    }
                    return Err(e);
                }
            }
        }

        if transactional {
            let conn = self.client().conn();
            conn.commit()?;
            conn.set_autocommit(true)?;
        }
        Ok(StreamWriteReport {
            processed,
            errors,
            aborted: false,
            message: "success".into(),
        })
    }

    /// Consume a record iterator, inserting row by row inside an
    /// enclosing transaction committed every `commit_every` rows.
    pub fn stream_insert(
        &mut self,
        records: impl Iterator<Item = Record>,
        table: &str,
        options: StreamWriteOptions,
    ) -> Result<StreamWriteReport, JrmError> {
        let table = table.to_string();
        self.stream_write(records, &options, move |db, record| {
            let (sql, binds) = crate::sql::build::Insert::into(table.as_str())
                .record(record)
                .to_sql(db.dialect())?;
            db.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(())
        })
    }

    /// Consume `(data, condition)` pairs, updating row by row.
    pub fn stream_update(
        &mut self,
        items: impl Iterator<Item = (Record, Condition)>,
        table: &str,
        options: StreamWriteOptions,
    ) -> Result<StreamWriteReport, JrmError> {
        let table = table.to_string();
        self.stream_write(items, &options, move |db, (data, condition)| {
            let (sql, binds) = Update::table(table.as_str())
                .set(data)
                .filter(condition)
                .to_sql(db.dialect())?;
            db.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(())
        })
    }

    /// Consume a record iterator, upserting row by row. `no_update`
    /// is honored exactly as in [`Db::merge`].
    pub fn stream_merge(
        &mut self,
        records: impl Iterator<Item = Record>,
        table: &str,
        key_columns: Vec<String>,
        no_update: bool,
        options: StreamWriteOptions,
    ) -> Result<StreamWriteReport, JrmError> {
        let table = table.to_string();
        self.stream_write(records, &options, move |db, record| {
            let (sql, binds) = Merge::into(table.as_str())
                .record(record)
                .keys(key_columns.clone())
                .no_update(no_update)
                .to_sql(db.dialect())?;
            db.execute_rendered(&sql, Params::Positional(binds))?;
            Ok(())
        })
    }

    /// Pipe a query straight to a CSV file. The header comes from the
    /// cursor description before the first row; writes flush every
    /// `batch_size` rows. Returns the number of data rows written.
    pub fn stream_to_csv(
        &mut self,
        sql: &str,
        path: impl AsRef<Path>,
        values: impl Into<Params>,
        options: CsvOptions,
    ) -> Result<u64, JrmError> {
        let mut builder = csv::WriterBuilder::new();
        if let Some(quote) = options.quote_char {
            builder.quote(quote).quote_style(csv::QuoteStyle::Always);
        }
        let mut writer = builder.from_path(path.as_ref())?;

        let max_errors = if options.abort_on_error { -1 } else { 0 };
        let batch_size = options.batch_size.max(1);
        let null_value = options.null_value.clone();
        let mut written: u64 = 0;

        let stream = self.stream_query(sql, values, max_errors)?;
        if options.header {
            let columns = stream.columns().to_vec();
            writer.write_record(&columns)?;
        }

        for element in stream {
            match element.status {
                RowStatus::Ok => {
                    let record = element.record.unwrap_or_default();
                    let fields: Vec<String> = record
                        .values()
                        .map(|v| match v {
                            Value::Null => null_value.clone(),
                            other => format::plain_text(other),
                        })
                        .collect();
                    writer.write_record(&fields)?;
                    written += 1;
                    if written % batch_size as u64 == 0 {
                        writer.flush()?;
                    }
                }
                RowStatus::Error(message) => {
                    warn!(row = element.index, error = %message, "skipping row");
                }
                RowStatus::Aborted(message) => {
                    writer.flush()?;
                    return Err(JrmError::StreamAborted {
                        errors: 1,
                        message,
                    });
                }
            }
        }
        writer.flush()?;
        Ok(written)
    }
}
