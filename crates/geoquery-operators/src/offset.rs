//! Offset decorator: skips the first N features by reading them.

use geoquery_core::prelude::{Feature, Result, Schema};

use crate::traits::{BoxedReader, FeatureReader, Lifecycle};

pub struct OffsetReader {
    inner: BoxedReader,
    /// Features still to discard. Skipping is lazy and happens on the first
    /// `next_feature` call.
    pending: usize,
    state: Lifecycle,
}

impl OffsetReader {
    pub fn new(inner: BoxedReader, offset: usize) -> Self {
        tracing::debug!(offset, "offset decorator built");
        Self {
            inner,
            pending: offset,
            state: Lifecycle::default(),
        }
    }

    fn advance(&mut self) -> Result<Option<Feature>> {
        while self.pending > 0 {
            match self.inner.next_feature()? {
                Some(skipped) => {
                    tracing::trace!(id = %skipped.id, "skipped by offset");
                    self.pending -= 1;
                }
                None => {
                    self.pending = 0;
                    return Ok(None);
                }
            }
        }
        self.inner.next_feature()
    }
}

impl FeatureReader for OffsetReader {
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
        self.state.close("offset", self.inner.as_mut())
    }

    fn name(&self) -> &'static str {
        "offset"
    }

    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.name()];
        layers.extend(self.inner.layers());
        layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::testing::{drain, people, people_schema, VecReader};

    #[test]
    fn skips_leading_features() {
        let inner = VecReader::new(people_schema(), people(5));
        let mut reader = OffsetReader::new(Box::new(inner), 3);
        let ids: Vec<String> = drain(&mut reader).into_iter().map(|f| f.id.to_string()).collect();
        assert_eq!(ids, vec!["people.3", "people.4"]);
    }

    #[test]
    fn offset_at_or_past_the_end_is_empty_not_an_error() {
        for offset in [5, 9] {
            let inner = VecReader::new(people_schema(), people(5));
            let mut reader = OffsetReader::new(Box::new(inner), offset);
            assert!(reader.next_feature().unwrap().is_none());
            assert!(reader.next_feature().unwrap().is_none());
        }
    }

    #[test]
    fn closed_reader_yields_nothing() {
        let inner = VecReader::new(people_schema(), people(5));
        let counters = inner.counters.clone();
        let mut reader = OffsetReader::new(Box::new(inner), 0);
        reader.close().unwrap();
        assert!(reader.next_feature().unwrap().is_none());
        assert_eq!(counters.nexts(), 0);
        assert_eq!(counters.closes(), 1);
    }
}
