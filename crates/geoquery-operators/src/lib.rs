#![forbid(unsafe_code)]
//! geoquery-operators: the native reader contract and the six generic
//! fallback decorators (filter, reproject, offset, limit, retype, plus the
//! bounded `MaxFeaturesIter` used by bulk copies).
//!
//! Design intent:
//! - Pull-based and synchronous. A `next_feature` call may block on backend
//!   I/O; nothing here spawns threads.
//! - Every decorator wraps exactly one inner reader, owns only its own cursor
//!   state, and closes its inner reader exactly once.
//! - Construction-time problems (unknown attributes, missing transforms)
//!   surface from the constructors, never mid-stream.

pub mod eval;
pub mod filter;
pub mod limit;
pub mod offset;
pub mod reproject;
pub mod retype;
pub mod stream;
pub mod traits;

pub use eval::PredicateEvaluator;
pub use filter::FilterReader;
pub use limit::{LimitReader, MaxFeaturesIter};
pub use offset::OffsetReader;
pub use reproject::ReprojectReader;
pub use retype::RetypeReader;
pub use stream::FeatureStream;
pub use traits::{BoxedReader, FeatureReader, FeatureSource, Lifecycle};
