#![forbid(unsafe_code)]
//! geoquery-io: backends and file formats.
//!
//! - [`MemorySource`]: an in-memory table that declares any capability
//!   subset and honours exactly what it declares.
//! - JSONL feature reader/writer plus [`copy_features`] for bulk copies.

pub mod copy;
pub mod memory;
pub mod readers;
pub mod writers;

pub use copy::copy_features;
pub use memory::{MemorySource, SourceStats};
pub use readers::jsonl::JsonlReader;
pub use writers::jsonl::JsonlWriter;
