//! Query-layer configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Wrapped around both sides of table/column names; empty disables escaping.
    pub identifier_escape: String,

    /// Emit `?` placeholders plus a parameter list instead of inline literals.
    pub prepared_statements: bool,

    /// Character type non-string attributes are cast to before a LIKE.
    pub like_cast_type: String,

    /// SRID recorded for geometry parameters whose attribute declares no CRS.
    pub unknown_srid: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            identifier_escape: String::new(),
            prepared_statements: false,
            like_cast_type: "VARCHAR".to_string(),
            unknown_srid: -1,
        }
    }
}

impl QueryConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `GEOQUERY_IDENTIFIER_ESCAPE`: identifier escape string (e.g. `"`)
    /// - `GEOQUERY_PREPARED`: `true`/`1` to use prepared statements
    /// - `GEOQUERY_LIKE_CAST_TYPE`: character type for LIKE casts
    /// - `GEOQUERY_UNKNOWN_SRID`: SRID used when none is declared
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`QueryConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = lookup("GEOQUERY_IDENTIFIER_ESCAPE") {
            cfg.identifier_escape = s;
        }

        if let Some(s) = lookup("GEOQUERY_PREPARED") {
            match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => cfg.prepared_statements = true,
                "0" | "false" | "no" => cfg.prepared_statements = false,
                _ => {}
            }
        }

        if let Some(s) = lookup("GEOQUERY_LIKE_CAST_TYPE") {
            if !s.trim().is_empty() {
                cfg.like_cast_type = s;
            }
        }

        if let Some(s) = lookup("GEOQUERY_UNKNOWN_SRID") {
            if let Ok(v) = s.trim().parse::<i32>() {
                cfg.unknown_srid = v;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("GEOQUERY_IDENTIFIER_ESCAPE", "\""),
            ("GEOQUERY_PREPARED", "yes"),
            ("GEOQUERY_UNKNOWN_SRID", "0"),
        ]
        .into_iter()
        .collect();
        let cfg = QueryConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.identifier_escape, "\"");
        assert!(cfg.prepared_statements);
        assert_eq!(cfg.like_cast_type, "VARCHAR");
        assert_eq!(cfg.unknown_srid, 0);
    }

    #[test]
    fn unparseable_values_are_ignored() {
        let cfg = QueryConfig::from_lookup(|k| match k {
            "GEOQUERY_UNKNOWN_SRID" => Some("abc".into()),
            "GEOQUERY_PREPARED" => Some("maybe".into()),
            _ => None,
        });
        assert_eq!(cfg, QueryConfig::default());
    }
}
