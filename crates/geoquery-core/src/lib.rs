#![forbid(unsafe_code)]
//! geoquery-core: the data model shared by every other crate.
//!
//! Pure data and small helpers only. Readers, decorators and SQL live in
//! `geoquery-operators`, `geoquery-planner` and `geoquery-sql`.

pub mod capabilities;
pub mod config;
pub mod crs;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod transform;
pub mod types;

pub use error::{Error, Result};
