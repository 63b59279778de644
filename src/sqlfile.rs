//! SQL script splitting and execution.
//!
//! Splits a script into statements on `;`, honoring string literals
//! and `--`/`/* */` comments, and runs each statement in order.

use std::fs;
use std::path::Path;

use crate::db::{Db, DbResult};
use crate::error::JrmError;

/// Split a script into statements. Comment-only and empty fragments
/// are dropped; statement text keeps its internal comments.
pub fn split_statements(script: &str) -> Vec<String> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        SingleQuote,
        DoubleQuote,
        LineComment,
        BlockComment,
    }

    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match state {
            State::SingleQuote => {
                current.push(c);
                if c == '\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        current.push('\'');
                        i += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuote => {
                current.push(c);
                if c == '"' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                current.push(c);
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                current.push(c);
                if c == '*' && bytes.get(i + 1) == Some(&b'/') {
                    current.push('/');
                    i += 1;
                    state = State::Normal;
                }
            }
            State::Normal => match c {
                ';' => {
                    push_statement(&mut statements, &mut current);
                }
                '\'' => {
                    current.push(c);
                    state = State::SingleQuote;
                }
                '"' => {
                    current.push(c);
                    state = State::DoubleQuote;
                }
                '-' if bytes.get(i + 1) == Some(&b'-') => {
                    current.push_str("--");
                    i += 1;
                    state = State::LineComment;
                }
                '/' if bytes.get(i + 1) == Some(&b'*') => {
                    current.push_str("/*");
                    i += 1;
                    state = State::BlockComment;
                }
                _ => current.push(c),
            },
        }
        i += 1;
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() && !is_comment_only(text) {
        statements.push(text.to_string());
    }
    current.clear();
}

fn is_comment_only(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}

impl Db {
    /// Split and run a SQL script statement by statement, returning
    /// one result envelope per statement. Execution stops at the
    /// first failed statement, whose error envelope is last.
    pub fn run_script(&mut self, script: &str) -> Result<Vec<DbResult>, JrmError> {
        let mut results = Vec::new();
        for statement in split_statements(script) {
            let result = self.execute(&statement, Vec::new())?;
            let failed = !result.is_ok();
            results.push(result);
            if failed {
                break;
            }
        }
        Ok(results)
    }

    /// [`run_script`](Db::run_script) over a file.
    pub fn run_script_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<DbResult>, JrmError> {
        let script = fs::read_to_string(path.as_ref())?;
        self.run_script(&script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_semicolons() {
        let parts = split_statements("CREATE TABLE a (x INT); INSERT INTO a VALUES (1);");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "CREATE TABLE a (x INT)");
    }

    #[test]
    fn semicolon_in_string_is_data() {
        let parts = split_statements("INSERT INTO t VALUES ('a;b'); SELECT 1");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("'a;b'"));
    }

    #[test]
    fn comments_do_not_split() {
        let parts = split_statements(
            "-- leading; comment\nSELECT 1; /* mid; comment */ SELECT 2;",
        );
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn comment_only_fragments_dropped() {
        let parts = split_statements("-- nothing here\n;\n  ;");
        assert!(parts.is_empty());
    }

    #[test]
    fn escaped_quote_stays_inside() {
        let parts = split_statements("INSERT INTO t VALUES ('it''s; fine'); SELECT 1");
        assert_eq!(parts.len(), 2);
    }
}
