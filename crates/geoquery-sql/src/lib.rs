#![forbid(unsafe_code)]
//! geoquery-sql: lowers filter trees into SQL `WHERE` clauses.
//!
//! Two literal strategies share one visitor:
//! - `Inline` writes escaped literals into the text;
//! - `Prepared` writes `?` and records value, type and SRID per parameter.
//!
//! Spatial operators have no portable SQL; a [`SqlDialect`] supplies them.

pub mod compiler;
pub mod dialect;
pub mod keys;
pub mod like;
pub mod literal;
pub mod prepared;
pub mod select;

pub use compiler::{LiteralStrategy, SqlCompiler};
pub use dialect::{BaseDialect, PostgisDialect, SqlDialect};
pub use keys::{FidKeyMapper, KeyMapper};
pub use like::to_sql_pattern;
pub use literal::inline_literal;
pub use prepared::PreparedSql;
pub use select::SelectBuilder;
