//! Filter decorator: keeps only the features that satisfy a predicate.

use geoquery_core::prelude::{Feature, Predicate, Result, Schema};

use crate::eval::PredicateEvaluator;
use crate::traits::{discard, BoxedReader, FeatureReader, Lifecycle};

pub struct FilterReader {
    inner: BoxedReader,
    evaluator: PredicateEvaluator,
    state: Lifecycle,
}

impl FilterReader {
    /// The predicate is compiled against the inner reader's schema here, so
    /// an unknown attribute fails before any feature is read.
    /// On failure the inner reader is closed before the error is returned.
    pub fn new(inner: BoxedReader, predicate: &Predicate) -> Result<Self> {
        let evaluator = match PredicateEvaluator::compile(predicate, inner.schema()) {
            Ok(evaluator) => evaluator,
            Err(e) => return Err(discard(inner, "filter", e)),
        };
        tracing::debug!(type_name = inner.schema().type_name(), "filter decorator built");
        Ok(Self {
            inner,
            evaluator,
            state: Lifecycle::default(),
        })
    }

    fn advance(&mut self) -> Result<Option<Feature>> {
        while let Some(feature) = self.inner.next_feature()? {
            if self.evaluator.matches(&feature)? {
                return Ok(Some(feature));
            }
            tracing::trace!(id = %feature.id, "filtered out");
        }
        Ok(None)
    }
}

impl FeatureReader for FilterReader {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.state.is_closed() {
            return Ok(None);
        }
        let next = self.advance();
        self.state.track(next)
    }

    fn close(&mut self) -> Result<()> {
        self.state.close("filter", self.inner.as_mut())
    }

    fn name(&self) -> &'static str {
        "filter"
    }

    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.name()];
        layers.extend(self.inner.layers());
        layers
    }
}
