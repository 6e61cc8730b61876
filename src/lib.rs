#![forbid(unsafe_code)]
//! geoquery: capability-aware feature queries.
//!
//! A caller describes what it wants as a [`Query`](geoquery_core::query::Query); the
//! planner pushes down whatever the backend declares it can do and wraps the
//! native reader in generic decorators for the rest. Results never depend on
//! the declared capabilities. Relational backends can instead compile the
//! whole query to SQL.

pub use geoquery_core;
pub use geoquery_io;
pub use geoquery_operators;
pub use geoquery_planner;
pub use geoquery_sql;

pub use geoquery_core::prelude;
