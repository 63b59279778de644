//! Placeholder style detection and normalization.
//!
//! Callers may write SQL with any of the common marker styles; each
//! driver requires exactly one. [`normalize`] rewrites the SQL text to
//! the target style and rebuilds the values container to match, going
//! through a small lexer so that markers inside string literals and
//! comments are left alone.

use std::fmt;

use indexmap::IndexMap;

use crate::error::JrmError;
use crate::value::Value;

/// A placeholder marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` positional.
    Qmark,
    /// `%s` positional.
    Format,
    /// `$1`, `$2`, ... numbered.
    NumberedDollar,
    /// `:1`, `:2`, ... numbered.
    NumberedColon,
    /// `:name` named.
    NamedColon,
    /// `%(name)s` named.
    NamedPyformat,
    /// `$name` named.
    NamedDollar,
}

impl PlaceholderStyle {
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            PlaceholderStyle::NamedColon
                | PlaceholderStyle::NamedPyformat
                | PlaceholderStyle::NamedDollar
        )
    }
}

impl fmt::Display for PlaceholderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaceholderStyle::Qmark => "?",
            PlaceholderStyle::Format => "%s",
            PlaceholderStyle::NumberedDollar => "$n",
            PlaceholderStyle::NumberedColon => ":n",
            PlaceholderStyle::NamedColon => ":name",
            PlaceholderStyle::NamedPyformat => "%(name)s",
            PlaceholderStyle::NamedDollar => "$name",
        };
        f.write_str(s)
    }
}

/// Bind values: a positional sequence or a named mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Positional(Vec<Value>),
    Named(IndexMap<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(v) => v.len(),
            Params::Named(m) => m.len(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(v: Vec<Value>) -> Self {
        Params::Positional(v)
    }
}

impl From<IndexMap<String, Value>> for Params {
    fn from(m: IndexMap<String, Value>) -> Self {
        Params::Named(m)
    }
}

/// One marker occurrence in the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
    pub kind: MarkerKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerKind {
    /// Sequential positional marker (`?`, `%s`).
    Positional(PlaceholderStyle),
    /// Explicitly numbered marker (`$2`, `:3`); 1-based.
    Numbered(PlaceholderStyle, usize),
    /// Named marker.
    Named(PlaceholderStyle, String),
}

impl MarkerKind {
    fn style(&self) -> PlaceholderStyle {
        match self {
            MarkerKind::Positional(s) | MarkerKind::Numbered(s, _) => *s,
            MarkerKind::Named(s, _) => *s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexState {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan the SQL text for placeholder markers, tracking quote and
/// comment state so literals like `'50%'` or `-- :not_a_param` are
/// never rewritten.
pub fn scan(sql: &str) -> Vec<Marker> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut state = LexState::Normal;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match state {
            LexState::SingleQuote => {
                if c == '\'' {
                    // '' is an escaped quote, stay inside
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        state = LexState::Normal;
                    }
                }
            }
            LexState::DoubleQuote => {
                if c == '"' {
                    state = LexState::Normal;
                }
            }
            LexState::LineComment => {
                if c == '\n' {
                    state = LexState::Normal;
                }
            }
            LexState::BlockComment => {
                if c == '*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 1;
                    state = LexState::Normal;
                }
            }
            LexState::Normal => match c {
                '\'' => state = LexState::SingleQuote,
                '"' => state = LexState::DoubleQuote,
                '-' if bytes.get(i + 1) == Some(&b'-') => {
                    i += 1;
                    state = LexState::LineComment;
                }
                '/' if bytes.get(i + 1) == Some(&b'*') => {
                    i += 1;
                    state = LexState::BlockComment;
                }
                '?' => markers.push(Marker {
                    start: i,
                    end: i + 1,
                    kind: MarkerKind::Positional(PlaceholderStyle::Qmark),
                }),
                '%' => {
                    if bytes.get(i + 1) == Some(&b'%') {
                        i += 1; // literal percent
                    } else if bytes.get(i + 1) == Some(&b's') {
                        markers.push(Marker {
                            start: i,
                            end: i + 2,
                            kind: MarkerKind::Positional(PlaceholderStyle::Format),
                        });
                        i += 1;
                    } else if bytes.get(i + 1) == Some(&b'(') {
                        // %(name)s
                        if let Some(close) = sql[i + 2..].find(')') {
                            let name = &sql[i + 2..i + 2 + close];
                            let after = i + 2 + close + 1;
                            if bytes.get(after) == Some(&b's')
                                && !name.is_empty()
                                && name.chars().all(is_ident_char)
                            {
                                markers.push(Marker {
                                    start: i,
                                    end: after + 1,
                                    kind: MarkerKind::Named(
                                        PlaceholderStyle::NamedPyformat,
                                        name.to_string(),
                                    ),
                                });
                                i = after;
                            }
                        }
                    }
                }
                '$' => {
                    let rest = &sql[i + 1..];
                    let digits: String =
                        rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                    if !digits.is_empty() {
                        markers.push(Marker {
                            start: i,
                            end: i + 1 + digits.len(),
                            kind: MarkerKind::Numbered(
                                PlaceholderStyle::NumberedDollar,
                                digits.parse().unwrap_or(0),
                            ),
                        });
                        i += digits.len();
                    } else if rest.chars().next().map(is_ident_start).unwrap_or(false) {
                        let name: String = rest.chars().take_while(|c| is_ident_char(*c)).collect();
                        markers.push(Marker {
                            start: i,
                            end: i + 1 + name.len(),
                            kind: MarkerKind::Named(PlaceholderStyle::NamedDollar, name.clone()),
                        });
                        i += name.len();
                    }
                }
                ':' => {
                    // skip `::` casts and array slices
                    let prev_colon = i > 0 && bytes[i - 1] == b':';
                    let next_colon = bytes.get(i + 1) == Some(&b':');
                    if !prev_colon && !next_colon {
                        let rest = &sql[i + 1..];
                        let digits: String =
                            rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                        if !digits.is_empty() {
                            markers.push(Marker {
                                start: i,
                                end: i + 1 + digits.len(),
                                kind: MarkerKind::Numbered(
                                    PlaceholderStyle::NumberedColon,
                                    digits.parse().unwrap_or(0),
                                ),
                            });
                            i += digits.len();
                        } else if rest.chars().next().map(is_ident_start).unwrap_or(false) {
                            let name: String =
                                rest.chars().take_while(|c| is_ident_char(*c)).collect();
                            markers.push(Marker {
                                start: i,
                                end: i + 1 + name.len(),
                                kind: MarkerKind::Named(
                                    PlaceholderStyle::NamedColon,
                                    name.clone(),
                                ),
                            });
                            i += name.len();
                        }
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    markers
}

/// Detect which marker style a SQL text uses.
///
/// Returns `Ok(None)` for marker-free SQL. Mixing styles is a
/// [`JrmError::MalformedBinding`].
pub fn detect_style(sql: &str) -> Result<Option<PlaceholderStyle>, JrmError> {
    let markers = scan(sql);
    let mut style: Option<PlaceholderStyle> = None;
    for m in &markers {
        match style {
            None => style = Some(m.kind.style()),
            Some(s) if s == m.kind.style() => {}
            Some(s) => {
                return Err(JrmError::MalformedBinding(format!(
                    "mixed placeholder styles {} and {}",
                    s,
                    m.kind.style()
                )))
            }
        }
    }
    Ok(style)
}

fn render_marker(style: PlaceholderStyle, position: usize, name: Option<&str>) -> String {
    match style {
        PlaceholderStyle::Qmark => "?".to_string(),
        PlaceholderStyle::Format => "%s".to_string(),
        PlaceholderStyle::NumberedDollar => format!("${}", position + 1),
        PlaceholderStyle::NumberedColon => format!(":{}", position + 1),
        PlaceholderStyle::NamedColon => format!(":{}", name.unwrap_or_default()),
        PlaceholderStyle::NamedPyformat => format!("%({})s", name.unwrap_or_default()),
        PlaceholderStyle::NamedDollar => format!("${}", name.unwrap_or_default()),
    }
}

/// Rewrite `sql` so every marker uses `target` style, rebuilding the
/// values container to match.
///
/// Named-to-positional conversion preserves the left-to-right textual
/// order of the markers; repeated named markers repeat the value.
/// Normalizing already-normal input returns it unchanged.
pub fn normalize(
    sql: &str,
    params: Params,
    target: PlaceholderStyle,
) -> Result<(String, Params), JrmError> {
    let markers = scan(sql);
    if markers.is_empty() {
        if !params.is_empty() {
            return Err(JrmError::MalformedBinding(format!(
                "no placeholders in SQL but {} value(s) supplied",
                params.len()
            )));
        }
        return Ok((sql.to_string(), params));
    }

    // Reject mixed styles up front.
    detect_style(sql)?;

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;

    if target.is_named() {
        let mut named: IndexMap<String, Value> = IndexMap::new();
        for (idx, m) in markers.iter().enumerate() {
            out.push_str(&sql[cursor..m.start]);
            cursor = m.end;
            match &m.kind {
                MarkerKind::Named(_, name) => {
                    let value = match &params {
                        Params::Named(map) => map.get(name).cloned().ok_or_else(|| {
                            JrmError::MalformedBinding(format!("no value for parameter :{name}"))
                        })?,
                        _ => {
                            return Err(JrmError::MalformedBinding(
                                "named placeholders require a mapping of values".into(),
                            ))
                        }
                    };
                    named.insert(name.clone(), value);
                    out.push_str(&render_marker(target, idx, Some(name)));
                }
                MarkerKind::Positional(_) | MarkerKind::Numbered(_, _) => {
                    // Synthesize p1..pn names for positional input.
                    let pos = match &m.kind {
                        MarkerKind::Numbered(_, n) => n.checked_sub(1).ok_or_else(|| {
                            JrmError::MalformedBinding("placeholder number 0".into())
                        })?,
                        _ => idx,
                    };
                    let value = match &params {
                        Params::Positional(vals) => vals.get(pos).cloned().ok_or_else(|| {
                            JrmError::MalformedBinding(format!(
                                "placeholder {} of {} has no value",
                                pos + 1,
                                vals.len()
                            ))
                        })?,
                        _ => {
                            return Err(JrmError::MalformedBinding(
                                "positional placeholders require a sequence of values".into(),
                            ))
                        }
                    };
                    let name = format!("p{}", pos + 1);
                    named.insert(name.clone(), value);
                    out.push_str(&render_marker(target, idx, Some(&name)));
                }
            }
        }
        out.push_str(&sql[cursor..]);
        return Ok((out, Params::Named(named)));
    }

    // Positional target.
    let mut values: Vec<Value> = Vec::with_capacity(markers.len());
    for (idx, m) in markers.iter().enumerate() {
        out.push_str(&sql[cursor..m.start]);
        cursor = m.end;
        let value = match (&m.kind, &params) {
            (MarkerKind::Positional(_), Params::Positional(vals)) => {
                vals.get(idx).cloned().ok_or_else(|| {
                    JrmError::MalformedBinding(format!(
                        "{} placeholder(s) but {} value(s)",
                        markers.len(),
                        vals.len()
                    ))
                })?
            }
            (MarkerKind::Numbered(_, n), Params::Positional(vals)) => {
                let pos = n.checked_sub(1).ok_or_else(|| {
                    JrmError::MalformedBinding("placeholder number 0".into())
                })?;
                vals.get(pos).cloned().ok_or_else(|| {
                    JrmError::MalformedBinding(format!(
                        "placeholder ${} has no value ({} supplied)",
                        n,
                        vals.len()
                    ))
                })?
            }
            (MarkerKind::Named(_, name), Params::Named(map)) => {
                map.get(name).cloned().ok_or_else(|| {
                    JrmError::MalformedBinding(format!("no value for parameter :{name}"))
                })?
            }
            (MarkerKind::Named(_, _), _) => {
                return Err(JrmError::MalformedBinding(
                    "named placeholders require a mapping of values".into(),
                ))
            }
            (_, _) => {
                return Err(JrmError::MalformedBinding(
                    "positional placeholders require a sequence of values".into(),
                ))
            }
        };
        values.push(value);
        out.push_str(&render_marker(target, idx, None));
    }
    out.push_str(&sql[cursor..]);

    if let Params::Positional(vals) = &params {
        let sequential = markers
            .iter()
            .all(|m| matches!(m.kind, MarkerKind::Positional(_)));
        if sequential && vals.len() != markers.len() {
            return Err(JrmError::MalformedBinding(format!(
                "{} placeholder(s) but {} value(s)",
                markers.len(),
                vals.len()
            )));
        }
    }

    Ok((out, Params::Positional(values)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals(n: usize) -> Params {
        Params::Positional((0..n as i64).map(Value::Int).collect())
    }

    #[test]
    fn qmark_is_fixed_point() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        let (out, _) = normalize(sql, vals(2), PlaceholderStyle::Qmark).unwrap();
        assert_eq!(out, sql);
    }

    #[test]
    fn qmark_to_dollar() {
        let (out, params) =
            normalize("SELECT * FROM t WHERE a = ? AND b = ?", vals(2), PlaceholderStyle::NumberedDollar)
                .unwrap();
        assert_eq!(out, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn named_to_qmark_preserves_textual_order() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Int(25));
        map.insert("n".to_string(), Value::Text("J".into()));
        let (out, params) = normalize(
            "SELECT * FROM u WHERE n = :n AND a = :a",
            Params::Named(map),
            PlaceholderStyle::Qmark,
        )
        .unwrap();
        assert_eq!(out, "SELECT * FROM u WHERE n = ? AND a = ?");
        assert_eq!(
            params,
            Params::Positional(vec![Value::Text("J".into()), Value::Int(25)])
        );
    }

    #[test]
    fn pyformat_named() {
        let mut map = IndexMap::new();
        map.insert("id".to_string(), Value::Int(7));
        let (out, params) = normalize(
            "DELETE FROM t WHERE id = %(id)s",
            Params::Named(map),
            PlaceholderStyle::Qmark,
        )
        .unwrap();
        assert_eq!(out, "DELETE FROM t WHERE id = ?");
        assert_eq!(params, Params::Positional(vec![Value::Int(7)]));
    }

    #[test]
    fn literals_and_comments_untouched()  {
        let sql = "SELECT ':fake' AS a, \" ? \" AS b FROM t -- :also_fake\n/* %s */ WHERE x = :real";
        let markers = scan(sql);
        assert_eq!(markers.len(), 1);
        assert!(matches!(
            &markers[0].kind,
            MarkerKind::Named(PlaceholderStyle::NamedColon, n) if n == "real"
        ));
    }

    #[test]
    fn cast_is_not_a_marker() {
        assert!(scan("SELECT a::text FROM t").is_empty());
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        assert!(scan("SELECT 'it''s ? fine' FROM t").is_empty());
    }

    #[test]
    fn missing_named_key() {
        let err = normalize(
            "SELECT :a",
            Params::Named(IndexMap::new()),
            PlaceholderStyle::Qmark,
        )
        .unwrap_err();
        assert!(matches!(err, JrmError::MalformedBinding(_)));
    }

    #[test]
    fn count_mismatch() {
        let err = normalize("SELECT ?, ?", vals(1), PlaceholderStyle::Qmark).unwrap_err();
        assert!(matches!(err, JrmError::MalformedBinding(_)));
        let err = normalize("SELECT 1", vals(1), PlaceholderStyle::Qmark).unwrap_err();
        assert!(matches!(err, JrmError::MalformedBinding(_)));
    }

    #[test]
    fn mixed_styles_rejected() {
        let err = detect_style("SELECT ? FROM t WHERE a = :a").unwrap_err();
        assert!(matches!(err, JrmError::MalformedBinding(_)));
    }

    #[test]
    fn dollar_numbered_out_of_order() {
        let (out, params) = normalize(
            "SELECT $2, $1",
            Params::Positional(vec![Value::Int(10), Value::Int(20)]),
            PlaceholderStyle::Qmark,
        )
        .unwrap();
        assert_eq!(out, "SELECT ?, ?");
        assert_eq!(
            params,
            Params::Positional(vec![Value::Int(20), Value::Int(10)])
        );
    }

    #[test]
    fn qmark_to_numbered_colon() {
        let (out, _) = normalize("a = ? AND b = ?", vals(2), PlaceholderStyle::NumberedColon).unwrap();
        assert_eq!(out, "a = :1 AND b = :2");
    }
}
