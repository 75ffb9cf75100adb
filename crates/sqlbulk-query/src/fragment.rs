//! Parameterized SQL fragments with named placeholders.
//!
//! A fragment is SQL text containing `@name` placeholders plus the ordered
//! list of `(name, value)` pairs they stand for. The set of placeholders in
//! the text always equals the set of parameter names. Appending one fragment
//! to another renames colliding placeholders, so fragments produced
//! independently (a predicate and an assignment list, say) can be merged
//! without their parameters clobbering each other.
//!
//! Placeholders inside string literals (`'a@b'`) and quoted identifiers
//! (`"x@y"`) are not placeholders and are left alone.

use regex::Regex;
use sqlbulk_core::{Error, Result, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

fn is_valid_placeholder(name: &str) -> bool {
    PLACEHOLDER_NAME
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

/// SQL text with named parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    sql: String,
    params: Vec<(String, Value)>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fragment with no parameters.
    ///
    /// The text must not contain placeholders.
    pub fn raw(sql: impl Into<String>) -> Result<Self> {
        Self::from_parts(sql, Vec::new())
    }

    /// Build a fragment from text and parameters, checking that every
    /// placeholder has exactly one parameter and every parameter is used.
    pub fn from_parts(sql: impl Into<String>, params: Vec<(String, Value)>) -> Result<Self> {
        let sql = sql.into();
        let mut names = HashSet::new();
        for (name, _) in &params {
            if !is_valid_placeholder(name) {
                return Err(Error::translation(
                    format!("@{name}"),
                    "invalid placeholder name",
                ));
            }
            if !names.insert(name.as_str()) {
                return Err(Error::translation(
                    format!("@{name}"),
                    "parameter bound more than once",
                ));
            }
        }

        let used: HashSet<&str> = scan_placeholders(&sql)
            .into_iter()
            .map(|(start, end)| &sql[start + 1..end])
            .collect();
        if let Some(missing) = used.iter().find(|n| !names.contains(*n)) {
            return Err(Error::translation(
                format!("@{missing}"),
                "placeholder has no parameter",
            ));
        }
        if let Some(unused) = names.iter().find(|n| !used.contains(*n)) {
            return Err(Error::translation(
                format!("@{unused}"),
                "parameter is not referenced by the SQL text",
            ));
        }

        Ok(Self { sql, params })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Append literal SQL text (keywords, identifiers, punctuation).
    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Bind `value` under a fresh `@{prefix}N` name and append the
    /// placeholder to the text.
    pub fn push_param(&mut self, prefix: &str, value: Value) -> String {
        let name = self.fresh_name(prefix, &HashSet::new());
        self.sql.push('@');
        self.sql.push_str(&name);
        self.params.push((name.clone(), value));
        name
    }

    /// Append `other`, renaming any of its placeholders whose names are
    /// already taken here.
    pub fn append(&mut self, other: SqlFragment) {
        let mut renames: HashMap<String, String> = HashMap::new();
        let mut reserved: HashSet<String> = other.params.iter().map(|(n, _)| n.clone()).collect();

        for (name, _) in &other.params {
            if self.has_param(name) {
                let fresh = self.fresh_name(base_of(name), &reserved);
                reserved.insert(fresh.clone());
                renames.insert(name.clone(), fresh);
            }
        }

        if renames.is_empty() {
            self.sql.push_str(&other.sql);
        } else {
            self.sql.push_str(&rewrite(&other.sql, |name| {
                renames.get(name).cloned()
            }));
        }
        for (name, value) in other.params {
            let name = renames.remove(&name).unwrap_or(name);
            self.params.push((name, value));
        }
    }

    /// Render for SQLite: placeholders become `?1`, `?2`, ... in order of
    /// first appearance, with the values in matching order.
    pub fn to_positional(&self) -> Result<(String, Vec<Value>)> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut values = Vec::with_capacity(self.params.len());
        let mut sql = String::with_capacity(self.sql.len());
        let mut last = 0;

        for (start, end) in scan_placeholders(&self.sql) {
            let name = &self.sql[start + 1..end];
            let index = if let Some(&i) = positions.get(name) {
                i
            } else {
                let value = self
                    .params
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| {
                        Error::translation(format!("@{name}"), "placeholder has no parameter")
                    })?;
                values.push(value);
                positions.insert(name, values.len());
                values.len()
            };
            sql.push_str(&self.sql[last..start]);
            sql.push('?');
            sql.push_str(&index.to_string());
            last = end;
        }
        sql.push_str(&self.sql[last..]);

        Ok((sql, values))
    }

    /// Placeholder names in order of appearance (repeats included).
    pub fn placeholders(&self) -> Vec<&str> {
        scan_placeholders(&self.sql)
            .into_iter()
            .map(|(start, end)| &self.sql[start + 1..end])
            .collect()
    }

    fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    fn fresh_name(&self, prefix: &str, reserved: &HashSet<String>) -> String {
        let mut n = self.params.len();
        loop {
            let candidate = format!("{prefix}{n}");
            if !self.has_param(&candidate) && !reserved.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Placeholder name without its numeric suffix (`p12` → `p`).
fn base_of(name: &str) -> &str {
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.is_empty() { "p" } else { base }
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte ranges `[start, end)` of every `@name` outside quotes; `start` is
/// the `@`.
fn scan_placeholders(sql: &str) -> Vec<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                // A doubled quote is an escaped quote and stays inside.
                if b == q {
                    if bytes.get(i + 1) == Some(&q) {
                        i += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            None => {
                if b == b'\'' || b == b'"' {
                    quote = Some(b);
                } else if b == b'@'
                    && bytes
                        .get(i + 1)
                        .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_')
                {
                    let start = i;
                    i += 1;
                    while i < bytes.len() && is_name_char(bytes[i]) {
                        i += 1;
                    }
                    found.push((start, i));
                    continue;
                }
            }
        }
        i += 1;
    }

    found
}

/// Rewrite placeholder names through `rename`; unmapped names are kept.
fn rewrite(sql: &str, rename: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (start, end) in scan_placeholders(sql) {
        out.push_str(&sql[last..start]);
        let name = &sql[start + 1..end];
        out.push('@');
        match rename(name) {
            Some(new) => out.push_str(&new),
            None => out.push_str(name),
        }
        last = end;
    }
    out.push_str(&sql[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(f: &SqlFragment) -> Vec<&str> {
        f.params().iter().map(|(n, _)| n.as_str()).collect()
    }

    #[test]
    fn push_param_allocates_sequential_names() {
        let mut f = SqlFragment::new();
        f.push_sql("\"a\" = ");
        f.push_param("p", Value::Int(1));
        f.push_sql(" AND \"b\" = ");
        f.push_param("p", Value::Int(2));
        assert_eq!(f.sql(), "\"a\" = @p0 AND \"b\" = @p1");
        assert_eq!(names(&f), ["p0", "p1"]);
    }

    #[test]
    fn append_renames_collisions() {
        let mut left = SqlFragment::new();
        left.push_sql("x = ");
        left.push_param("p", Value::Int(1));

        let mut right = SqlFragment::new();
        right.push_sql(" AND y = ");
        right.push_param("p", Value::Int(2));
        right.push_sql(" AND z = ");
        right.push_param("p", Value::Int(3));

        left.append(right);
        assert_eq!(left.sql(), "x = @p0 AND y = @p2 AND z = @p1");
        assert_eq!(names(&left), ["p0", "p2", "p1"]);

        let placeholders: HashSet<_> = left.placeholders().into_iter().collect();
        let params: HashSet<_> = names(&left).into_iter().collect();
        assert_eq!(placeholders, params);
    }

    #[test]
    fn append_without_collisions_keeps_names() {
        let mut set = SqlFragment::new();
        set.push_param("s", Value::Bool(false));
        let mut pred = SqlFragment::new();
        pred.push_param("p", Value::Int(7));
        set.append(pred);
        assert_eq!(set.sql(), "@s0@p0");
    }

    #[test]
    fn positional_rendering() {
        let f = SqlFragment::from_parts(
            "a = @p1 OR b = @p0 OR c = @p1",
            vec![
                ("p0".to_string(), Value::Int(10)),
                ("p1".to_string(), Value::Int(11)),
            ],
        )
        .unwrap();
        let (sql, values) = f.to_positional().unwrap();
        assert_eq!(sql, "a = ?1 OR b = ?2 OR c = ?1");
        assert_eq!(values, [Value::Int(11), Value::Int(10)]);
    }

    #[test]
    fn quoted_text_is_not_scanned() {
        let f = SqlFragment::raw("SELECT 'me@example.com', \"odd@name\"").unwrap();
        assert!(f.placeholders().is_empty());
        let (sql, values) = f.to_positional().unwrap();
        assert_eq!(sql, "SELECT 'me@example.com', \"odd@name\"");
        assert!(values.is_empty());

        let f = SqlFragment::raw("SELECT 'it''s @x'").unwrap();
        assert!(f.placeholders().is_empty());
    }

    #[test]
    fn from_parts_checks_the_placeholder_set() {
        assert!(SqlFragment::raw("a = @p0").is_err());
        assert!(SqlFragment::from_parts("a = 1", vec![("p0".into(), Value::Null)]).is_err());
        assert!(
            SqlFragment::from_parts("a = @0bad", vec![("0bad".into(), Value::Null)]).is_err()
        );
        assert!(
            SqlFragment::from_parts(
                "a = @x",
                vec![("x".into(), Value::Null), ("x".into(), Value::Null)]
            )
            .is_err()
        );
    }
}
