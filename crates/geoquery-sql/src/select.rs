//! Whole-query `SELECT` statements for relational backends.

use geoquery_core::prelude::*;

use crate::compiler::SqlCompiler;
use crate::prepared::PreparedSql;

/// Renders `SELECT cols FROM table [WHERE ..] [ORDER BY ..] [LIMIT n] [OFFSET m]`.
pub struct SelectBuilder<'a> {
    compiler: &'a SqlCompiler,
    table: String,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(compiler: &'a SqlCompiler, table: impl Into<String>) -> Self {
        Self {
            compiler,
            table: table.into(),
        }
    }

    pub fn build(&self, query: &Query) -> Result<PreparedSql> {
        let columns: Vec<String> = match &query.properties {
            Some(names) if !names.is_empty() => {
                names.iter().map(|n| self.compiler.identifier(n)).collect()
            }
            // An empty projection still needs a select list.
            Some(_) => vec!["1".to_string()],
            None => self
                .compiler
                .schema()
                .names()
                .map(|n| self.compiler.identifier(n))
                .collect(),
        };

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            self.compiler.identifier(&self.table)
        );

        let mut out = PreparedSql::default();
        if !query.predicate.is_include() {
            let clause = self.compiler.compile(&query.predicate)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause.sql);
            out.values = clause.values;
            out.types = clause.types;
            out.srids = clause.srids;
        }

        if !query.sort.is_empty() {
            let mut keys = Vec::new();
            for sort in &query.sort {
                let dir = match sort.order {
                    SortOrder::Ascending => "ASC",
                    SortOrder::Descending => "DESC",
                };
                match &sort.key {
                    SortKey::Property(name) => {
                        keys.push(format!("{} {dir}", self.compiler.identifier(name)))
                    }
                    SortKey::Natural => {
                        let mapper = self.compiler.key_mapper().ok_or_else(|| {
                            Error::UnsupportedSort(
                                "natural order needs primary key columns".into(),
                            )
                        })?;
                        for column in mapper.column_names() {
                            keys.push(format!("{} {dir}", self.compiler.identifier(&column)));
                        }
                    }
                }
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(max) = query.max_features {
            sql.push_str(&format!(" LIMIT {max}"));
        }
        if query.start_index > 0 {
            sql.push_str(&format!(" OFFSET {}", query.start_index));
        }

        tracing::debug!(table = %self.table, %sql, "built select");
        out.sql = sql;
        Ok(out)
    }
}
