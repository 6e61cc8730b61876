//! Predicate to SQL compiler.
//!
//! One exhaustive visitor over the filter tree; the literal strategy only
//! changes how a literal leaf is written. Literal types come from the
//! property on the other side of an operator, so `lanes = '2'` is written as
//! `lanes = 2` when `lanes` is an integer column.

use std::collections::BTreeSet;
use std::sync::Arc;

use geoquery_core::prelude::*;

use crate::dialect::{BaseDialect, SqlDialect};
use crate::keys::KeyMapper;
use crate::like::to_sql_pattern;
use crate::literal::{inline_literal, quote};
use crate::prepared::PreparedSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralStrategy {
    Inline,
    Prepared,
}

#[derive(Clone)]
pub struct SqlCompiler {
    schema: Schema,
    strategy: LiteralStrategy,
    dialect: Arc<dyn SqlDialect>,
    key_mapper: Option<Arc<dyn KeyMapper>>,
    config: QueryConfig,
}

impl SqlCompiler {
    /// Inline strategy, base dialect, no key mapper, default config.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            strategy: LiteralStrategy::Inline,
            dialect: Arc::new(BaseDialect),
            key_mapper: None,
            config: QueryConfig::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: LiteralStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn prepared(self) -> Self {
        self.with_strategy(LiteralStrategy::Prepared)
    }

    pub fn with_dialect(mut self, dialect: Arc<dyn SqlDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_key_mapper(mut self, mapper: Arc<dyn KeyMapper>) -> Self {
        self.key_mapper = Some(mapper);
        self
    }

    /// Also picks the strategy from `prepared_statements`.
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.strategy = if config.prepared_statements {
            LiteralStrategy::Prepared
        } else {
            LiteralStrategy::Inline
        };
        self.config = config;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn strategy(&self) -> LiteralStrategy {
        self.strategy
    }

    pub fn key_mapper(&self) -> Option<&Arc<dyn KeyMapper>> {
        self.key_mapper.as_ref()
    }

    /// Compile to a `WHERE` clause body. For the inline strategy the
    /// parameter lists are empty.
    pub fn compile(&self, predicate: &Predicate) -> Result<PreparedSql> {
        let mut out = PreparedSql::default();
        let sql = self.predicate(predicate, &mut out)?;
        out.sql = sql;
        tracing::trace!(dialect = self.dialect.name(), params = out.parameter_count(), "compiled predicate");
        Ok(out)
    }

    /// Escaped identifier.
    pub fn identifier(&self, name: &str) -> String {
        let esc = &self.config.identifier_escape;
        format!("{esc}{name}{esc}")
    }

    fn predicate(&self, p: &Predicate, out: &mut PreparedSql) -> Result<String> {
        Ok(match p {
            Predicate::Include => "1 = 1".to_string(),
            Predicate::Exclude => "0 = 1".to_string(),
            Predicate::And(children) => self.group(children, " AND ", "1 = 1", out)?,
            Predicate::Or(children) => self.group(children, " OR ", "0 = 1", out)?,
            Predicate::Not(child) => format!("NOT ({})", self.predicate(child, out)?),
            Predicate::Comparison {
                op,
                left,
                right,
                match_case,
            } => {
                let left_ctx = self.context(right).or_else(|| self.context(left));
                let right_ctx = self.context(left).or_else(|| self.context(right));
                let resolved = match (left, right) {
                    (Expression::Property(_), _) => self.context(left),
                    (_, Expression::Property(_)) => self.context(right),
                    _ => self.context(left).or_else(|| self.context(right)),
                };
                let mut l = self.expression(left, left_ctx, out)?;
                let mut r = self.expression(right, right_ctx, out)?;
                if !match_case
                    && op.is_equality()
                    && resolved.is_some_and(ValueType::is_string_like)
                {
                    l = format!("LOWER({l})");
                    r = format!("LOWER({r})");
                }
                format!("{l} {} {r}", sql_operator(*op))
            }
            Predicate::Between { expr, lower, upper } => {
                let ctx = self.context(expr);
                let e = self.expression(expr, None, out)?;
                let lo = self.expression(lower, ctx, out)?;
                let hi = self.expression(upper, ctx, out)?;
                format!("{e} BETWEEN {lo} AND {hi}")
            }
            Predicate::Like {
                expr,
                pattern,
                wildcard,
                single_char,
                escape,
                match_case,
            } => {
                let ty = self.context(expr);
                let mut e = self.expression(expr, None, out)?;
                let mut sql_pattern = to_sql_pattern(pattern, *wildcard, *single_char, *escape);
                if ty.is_some_and(|t| !t.is_string_like()) {
                    e = format!("CAST({e} AS {})", self.config.like_cast_type);
                }
                if !match_case {
                    e = format!("UPPER({e})");
                    sql_pattern = sql_pattern.to_uppercase();
                }
                if ty == Some(ValueType::Date) {
                    sql_pattern.push('%');
                }
                // Backslash is not a default LIKE escape on most engines.
                let escape_clause = if sql_pattern.contains('\\') { " ESCAPE '\\'" } else { "" };
                let pat = self.literal(&Value::Str(sql_pattern), Some(ValueType::String), out);
                format!("{e} LIKE {pat}{escape_clause}")
            }
            Predicate::IsNull(expr) => format!("{} IS NULL", self.expression(expr, None, out)?),
            Predicate::Id(ids) => self.ids(ids, out)?,
            Predicate::Spatial {
                op,
                property,
                geometry,
                distance,
            } => {
                let prop = self.expression(property, None, out)?;
                let srid = self.srid_of(property);
                let polygon = geometry.to_polygon();
                let operand = match self.strategy {
                    LiteralStrategy::Inline => quote(&polygon.to_string()),
                    LiteralStrategy::Prepared => {
                        out.push(Value::Geometry(polygon), Some(ValueType::Geometry), Some(srid));
                        "?".to_string()
                    }
                };
                let geom = self.dialect.geometry_operand(&operand, srid);
                self.dialect.spatial(*op, &prop, &geom, *distance)?
            }
        })
    }

    fn group(
        &self,
        children: &[Predicate],
        joiner: &str,
        empty: &str,
        out: &mut PreparedSql,
    ) -> Result<String> {
        if children.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = children
            .iter()
            .map(|c| self.predicate(c, out))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("({})", parts.join(joiner)))
    }

    fn ids(&self, ids: &BTreeSet<FeatureId>, out: &mut PreparedSql) -> Result<String> {
        let mapper = self.key_mapper.as_ref().ok_or(Error::MissingKeyMapper)?;
        if ids.is_empty() {
            return Ok("0 = 1".to_string());
        }
        let columns = mapper.column_names();
        let multiple = ids.len() > 1;
        let mut clauses = Vec::with_capacity(ids.len());
        for id in ids {
            let values = mapper.key_values_for(id)?;
            let mut terms = Vec::with_capacity(columns.len());
            for (column, value) in columns.iter().zip(&values) {
                let ctx = self.schema.value_type_of(column);
                let lit = self.literal(value, ctx, out);
                terms.push(format!("{} = {lit}", self.identifier(column)));
            }
            clauses.push(format!("({})", terms.join(" AND ")));
        }
        let joined = clauses.join(" OR ");
        Ok(if multiple { format!("({joined})") } else { joined })
    }

    fn expression(
        &self,
        expr: &Expression,
        ctx: Option<ValueType>,
        out: &mut PreparedSql,
    ) -> Result<String> {
        Ok(match expr {
            Expression::Property(name) => self.identifier(name),
            Expression::Literal(v) => self.literal(v, ctx, out),
            Expression::Arithmetic { op, left, right } => {
                let l_ctx = self.context(right);
                let r_ctx = self.context(left);
                let l = self.expression(left, l_ctx, out)?;
                let r = self.expression(right, r_ctx, out)?;
                format!("({l} {} {r})", op.symbol())
            }
            Expression::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.expression(a, None, out))
                    .collect::<Result<Vec<_>>>()?;
                format!("{name}({})", args.join(", "))
            }
        })
    }

    /// Write one literal, coerced towards `ctx` when given.
    fn literal(&self, value: &Value, ctx: Option<ValueType>, out: &mut PreparedSql) -> String {
        let value = match ctx {
            Some(t) => value.coerce(t),
            None => value.clone(),
        };
        match self.strategy {
            LiteralStrategy::Inline => inline_literal(&value),
            LiteralStrategy::Prepared => {
                let ty = value.value_type().or(ctx);
                let srid = value.as_geometry().map(|g| {
                    g.crs
                        .as_ref()
                        .and_then(Crs::srid)
                        .unwrap_or(self.config.unknown_srid)
                });
                out.push(value, ty, srid);
                "?".to_string()
            }
        }
    }

    /// Declared type for properties, runtime type for literals.
    fn context(&self, expr: &Expression) -> Option<ValueType> {
        expr.value_type(Some(&self.schema))
    }

    /// SRID declared on the geometry attribute `property` refers to.
    fn srid_of(&self, property: &Expression) -> i32 {
        let declared = match property {
            Expression::Property(name) => self.schema.get(name),
            _ => self.schema.default_geometry(),
        };
        declared
            .and_then(|a| a.crs.as_ref())
            .and_then(Crs::srid)
            .unwrap_or(self.config.unknown_srid)
    }
}

fn sql_operator(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Neq => "<>",
        other => other.symbol(),
    }
}
