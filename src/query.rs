//! WHERE-clause assembly for the entity list endpoints.
//!
//! Filters reduce to equality, range and substring-pattern predicates on
//! named columns. Values are collected as `rusqlite::types::Value` so the
//! final statement binds them with `params_from_iter`.

use rusqlite::types::Value;

#[derive(Debug, Default)]
pub struct Predicates {
    conds: Vec<String>,
    values: Vec<Value>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(&mut self, column: &str, value: Option<impl Into<Value>>) {
        if let Some(v) = value {
            self.conds.push(format!("{} = ?", column));
            self.values.push(v.into());
        }
    }

    /// Case-insensitive substring match.
    pub fn like(&mut self, column: &str, needle: Option<String>) {
        if let Some(n) = needle {
            self.conds.push(format!("{} LIKE ? ESCAPE '\\'", column));
            self.values.push(Value::Text(format!("%{}%", escape_like(&n))));
        }
    }

    pub fn gte(&mut self, column: &str, value: Option<impl Into<Value>>) {
        if let Some(v) = value {
            self.conds.push(format!("{} >= ?", column));
            self.values.push(v.into());
        }
    }

    pub fn lte(&mut self, column: &str, value: Option<impl Into<Value>>) {
        if let Some(v) = value {
            self.conds.push(format!("{} <= ?", column));
            self.values.push(v.into());
        }
    }

    pub fn where_clause(&self) -> String {
        if self.conds.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conds.join(" AND "))
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
