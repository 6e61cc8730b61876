//! Inline SQL literals.

use geoquery_core::prelude::Value;

/// SQL text for `value`. Numbers and booleans are written as-is, null as
/// `NULL`, and everything else as a single-quoted string with embedded
/// quotes doubled.
pub fn inline_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(_) | Value::Int(_) | Value::Double(_) => value.to_string(),
        Value::Str(_) | Value::Date(_) | Value::Geometry(_) => quote(&value.to_string()),
    }
}

pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use geoquery_core::prelude::*;

    use super::*;

    #[test]
    fn renders_each_kind() {
        assert_eq!(inline_literal(&Value::Null), "NULL");
        assert_eq!(inline_literal(&Value::Bool(true)), "true");
        assert_eq!(inline_literal(&Value::Int(-4)), "-4");
        assert_eq!(inline_literal(&Value::Double(2.5)), "2.5");
        assert_eq!(inline_literal(&Value::from("O'Brien")), "'O''Brien'");
        assert_eq!(
            inline_literal(&Value::Geometry(Geometry::point(1.0, 2.0))),
            "'POINT (1 2)'"
        );
    }
}
