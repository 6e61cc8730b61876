//! Reader and source traits + the shared close/failure bookkeeping.
//!
//! A backend supplies a [`FeatureSource`]; the planner opens a native
//! [`FeatureReader`] from it and stacks decorators on top. Decorators expose
//! the very same trait, so any stack of them is again a reader.

use geoquery_core::prelude::{Capabilities, Error, Feature, Query, Result, Schema};

/// Forward-only, single-pass feature iterator.
///
/// Invariants:
/// - `next_feature` returns `Ok(None)` once exhausted or after `close`.
/// - `close` is idempotent and closes any wrapped reader exactly once.
pub trait FeatureReader: Send {
    /// Schema every yielded feature conforms to.
    fn schema(&self) -> &Schema;

    fn next_feature(&mut self) -> Result<Option<Feature>>;

    fn close(&mut self) -> Result<()>;

    /// Stable layer name, used for EXPLAIN output and logging.
    fn name(&self) -> &'static str {
        "native"
    }

    /// Layer names from the outermost decorator down to the native reader.
    fn layers(&self) -> Vec<&'static str> {
        vec![self.name()]
    }
}

pub type BoxedReader = Box<dyn FeatureReader>;

/// A backend collection. Any backend locking must be taken in `open_reader`
/// and released by the returned reader's `close`.
pub trait FeatureSource {
    fn schema(&self) -> &Schema;

    /// Queried once per pipeline open.
    fn capabilities(&self) -> Capabilities;

    /// Open a native reader. The query only carries what the planner decided
    /// to push down; everything else must be ignored by the backend.
    fn open_reader(&self, query: &Query) -> Result<BoxedReader>;
}

impl<S: FeatureSource + ?Sized> FeatureSource for &S {
    fn schema(&self) -> &Schema {
        (**self).schema()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn open_reader(&self, query: &Query) -> Result<BoxedReader> {
        (**self).open_reader(query)
    }
}

/// Close/failure state owned by each decorator.
#[derive(Debug, Default)]
pub struct Lifecycle {
    closed: bool,
    failed: bool,
}

impl Lifecycle {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Pass a result through, remembering whether the stream failed.
    pub fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Close `inner` once. After an earlier failure a close error is only
    /// logged, so it never masks the original error.
    pub fn close(&mut self, layer: &'static str, inner: &mut dyn FeatureReader) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match inner.close() {
            Ok(()) => Ok(()),
            Err(e) if self.failed => {
                tracing::warn!(layer, error = %e, "ignoring close failure after stream error");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Close a reader that a failed decorator constructor was handed, returning
/// the construction error. A close failure is logged and dropped.
pub(crate) fn discard(mut inner: BoxedReader, layer: &'static str, error: Error) -> Error {
    if let Err(e) = inner.close() {
        tracing::warn!(layer, error = %e, "ignoring close failure after construction error");
    }
    error
}
