//! Limit decorator and the bounded iterator used by bulk copies.

use geoquery_core::prelude::{Feature, Result, Schema};

use crate::traits::{BoxedReader, FeatureReader, Lifecycle};

/// Yields at most `limit` features. The inner reader is never advanced past
/// the last feature it is allowed to return.
pub struct LimitReader {
    inner: BoxedReader,
    remaining: usize,
    state: Lifecycle,
}

impl LimitReader {
    pub fn new(inner: BoxedReader, limit: usize) -> Self {
        tracing::debug!(limit, "limit decorator built");
        Self {
            inner,
            remaining: limit,
            state: Lifecycle::default(),
        }
    }
}

impl FeatureReader for LimitReader {
    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.state.is_closed() || self.remaining == 0 {
            return Ok(None);
        }
        let next = self.inner.next_feature();
        match self.state.track(next)? {
            Some(feature) => {
                self.remaining -= 1;
                Ok(Some(feature))
            }
            None => {
                self.remaining = 0;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.state.close("limit", self.inner.as_mut())
    }

    fn name(&self) -> &'static str {
        "limit"
    }

    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.name()];
        layers.extend(self.inner.layers());
        layers
    }
}

/// Bounds any iterator to `max` items. `max == 0` yields nothing and never
/// touches the delegate.
#[derive(Debug)]
pub struct MaxFeaturesIter<I> {
    delegate: I,
    max: usize,
    yielded: usize,
}

impl<I: Iterator> MaxFeaturesIter<I> {
    pub fn new(delegate: I, max: usize) -> Self {
        Self {
            delegate,
            max,
            yielded: 0,
        }
    }

    pub fn yielded(&self) -> usize {
        self.yielded
    }

    pub fn into_inner(self) -> I {
        self.delegate
    }
}

impl<I: Iterator> Iterator for MaxFeaturesIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded >= self.max {
            return None;
        }
        let item = self.delegate.next()?;
        self.yielded += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.max - self.yielded;
        let (lo, hi) = self.delegate.size_hint();
        (lo.min(left), Some(hi.map_or(left, |h| h.min(left))))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::traits::testing::{drain, people, people_schema, VecReader};

    #[test]
    fn stops_after_limit_without_reading_further() {
        let inner = VecReader::new(people_schema(), people(10));
        let counters = inner.counters.clone();
        let mut reader = LimitReader::new(Box::new(inner), 3);
        assert_eq!(drain(&mut reader).len(), 3);
        assert_eq!(counters.nexts(), 3);
    }

    #[test]
    fn zero_limit_never_reads() {
        let inner = VecReader::new(people_schema(), people(5));
        let counters = inner.counters.clone();
        let mut reader = LimitReader::new(Box::new(inner), 0);
        assert!(reader.next_feature().unwrap().is_none());
        assert_eq!(counters.nexts(), 0);
    }

    #[test]
    fn limit_larger_than_input() {
        let inner = VecReader::new(people_schema(), people(2));
        let mut reader = LimitReader::new(Box::new(inner), 50);
        assert_eq!(drain(&mut reader).len(), 2);
    }

    #[test]
    fn max_features_zero_never_calls_delegate() {
        let calls = Cell::new(0);
        let delegate = std::iter::from_fn(|| {
            calls.set(calls.get() + 1);
            Some(1)
        });
        let mut bounded = MaxFeaturesIter::new(delegate, 0);
        assert_eq!(bounded.next(), None);
        assert_eq!(bounded.next(), None);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn max_features_boundary() {
        let calls = Cell::new(0);
        let delegate = (0..10).inspect(|_| calls.set(calls.get() + 1));
        let out: Vec<_> = MaxFeaturesIter::new(delegate, 4).collect();
        assert_eq!(out, vec![0, 1, 2, 3]);
        assert_eq!(calls.get(), 4);
        assert_eq!(MaxFeaturesIter::new(0..3, 3).count(), 3);
        assert_eq!(MaxFeaturesIter::new(0..3, 7).size_hint(), (3, Some(3)));
    }
}
