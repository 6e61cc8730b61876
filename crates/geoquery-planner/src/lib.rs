#![forbid(unsafe_code)]
//! geoquery-planner: from a caller's Query to one composed feature stream.
//!
//! Flow:
//! - `resolve` rewrites aliased/xpath-like property names into schema names.
//! - `lower` splits the resolved query into what the backend runs natively
//!   and the decorator stages that make up the rest (`PipelinePlan`).
//! - `assembler` opens the native reader and stacks the decorators.
//! - `view` joins a defining query with every caller query.
//! - `dsl::yaml` reads query documents for the CLI and tests.

pub mod assembler;
pub mod dsl;
pub mod lower;
pub mod resolve;
pub mod view;

pub use assembler::PipelineAssembler;
pub use dsl::yaml::{parse_query_document, QueryDocument};
pub use lower::{lower, PipelinePlan, Stage};
pub use resolve::PropertyNameResolver;
pub use view::FeatureView;
