//! The compiled query handed to a statement executor.

use serde::Serialize;

use geoquery_core::prelude::{Value, ValueType};

use crate::literal::inline_literal;

/// SQL text plus three parallel parameter lists. `srids[i]` is `Some` only
/// when parameter `i` is a geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedSql {
    pub sql: String,
    pub values: Vec<Value>,
    pub types: Vec<Option<ValueType>>,
    pub srids: Vec<Option<i32>>,
}

impl PreparedSql {
    pub fn inline(sql: String) -> Self {
        Self {
            sql,
            ..Self::default()
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn push(&mut self, value: Value, value_type: Option<ValueType>, srid: Option<i32>) {
        self.values.push(value);
        self.types.push(value_type);
        self.srids.push(srid);
    }

    /// Substitute the parameters back into the placeholders, in order.
    /// `?` inside quoted text is left alone.
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut params = self.values.iter();
        let mut quoted = false;
        for c in self.sql.chars() {
            match c {
                '\'' => {
                    quoted = !quoted;
                    out.push(c);
                }
                '?' if !quoted => match params.next() {
                    Some(v) => out.push_str(&inline_literal(v)),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
        out
    }
}

impl std::fmt::Display for PreparedSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_skips_quoted_question_marks() {
        let mut p = PreparedSql::inline("a = ? AND b LIKE 'x?' AND c = ?".into());
        p.push(Value::Int(1), Some(ValueType::Integer), None);
        p.push(Value::from("it's"), Some(ValueType::String), None);
        assert_eq!(p.to_inline_sql(), "a = 1 AND b LIKE 'x?' AND c = 'it''s'");
        assert_eq!(p.parameter_count(), 2);
    }
}
