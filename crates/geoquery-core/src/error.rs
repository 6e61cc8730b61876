use thiserror::Error;

use crate::crs::Crs;
use crate::filter::SpatialOperator;

/// Canonical result for every geoquery crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A projection, predicate or sort references an attribute the schema
    /// does not declare, or a retype would widen the schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unsupported paging: {0}")]
    UnsupportedPaging(String),

    #[error("unsupported sort: {0}")]
    UnsupportedSort(String),

    #[error("spatial operator '{0}' is not supported by this SQL dialect")]
    UnsupportedSpatialOperator(SpatialOperator),

    #[error("id predicate requires a primary key mapping but none was configured")]
    MissingKeyMapper,

    #[error("no coordinate transform available from {from} to {to}")]
    NoTransformAvailable { from: Crs, to: Crs },

    #[error("unsupported function '{0}'")]
    UnsupportedFunction(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // Opaque passthrough from the native reader or backend.
    #[error("I/O failure: {0}")]
    Io(String),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(e.to_string())
    }
}
