//! Convenient re-exports for downstream crates.

pub use crate::capabilities::Capabilities;
pub use crate::config::QueryConfig;
pub use crate::crs::Crs;
pub use crate::error::{Error, Result};
pub use crate::filter::{
    ArithmeticOp, ComparisonOp, Expression, Predicate, SpatialOperator,
};
pub use crate::geometry::{Coord, Envelope, Geometry, Shape};
pub use crate::query::{Query, SortBy, SortKey, SortOrder};
pub use crate::schema::{AttributeDescriptor, Schema, ValueType};
pub use crate::transform::{CoordinateTransform, TransformProvider, TransformRegistry};
pub use crate::types::{Feature, FeatureId, Value};
