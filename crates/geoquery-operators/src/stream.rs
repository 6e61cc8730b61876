//! `Iterator` adapter over a composed reader.

use geoquery_core::prelude::{Feature, Result, Schema};

use crate::traits::BoxedReader;

/// Owns the outermost reader of a pipeline. Iteration ends after the first
/// error; dropping the stream closes it if the caller did not.
pub struct FeatureStream {
    reader: BoxedReader,
    done: bool,
    failed: bool,
    closed: bool,
}

impl FeatureStream {
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader,
            done: false,
            failed: false,
            closed: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        self.reader.schema()
    }

    /// Layer names, outermost first.
    pub fn layers(&self) -> Vec<&'static str> {
        self.reader.layers()
    }

    /// Close every wrapped layer. A second call is a no-op, and closing a
    /// stream that already yielded an error never fails.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.done = true;
        match self.reader.close() {
            Err(e) if self.failed => {
                tracing::warn!(error = %e, "close failed after stream error");
                Ok(())
            }
            other => other,
        }
    }

    /// Drain the stream, closing it afterwards either way.
    pub fn collect_all(mut self) -> Result<Vec<Feature>> {
        let mut out = Vec::new();
        let drained = loop {
            match self.reader.next_feature() {
                Ok(Some(f)) => out.push(f),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.done = true;
        self.failed = drained.is_err();
        self.close()?;
        drained.map(|()| out)
    }
}

impl Iterator for FeatureStream {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_feature() {
            Ok(Some(f)) => Some(Ok(f)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for FeatureStream {}

impl Drop for FeatureStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "feature stream close failed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use geoquery_core::prelude::*;

    use super::*;
    use crate::limit::LimitReader;
    use crate::offset::OffsetReader;
    use crate::traits::testing::{people, people_schema, VecReader};

    #[test]
    fn iterates_and_closes_once() {
        let inner = VecReader::new(people_schema(), people(6));
        let counters = inner.counters.clone();
        let reader = LimitReader::new(Box::new(OffsetReader::new(Box::new(inner), 2)), 3);
        let mut stream = FeatureStream::new(Box::new(reader));
        assert_eq!(stream.layers(), vec!["limit", "offset", "native"]);
        let ids: Vec<String> = stream
            .by_ref()
            .map(|f| f.unwrap().id.to_string())
            .collect();
        assert_eq!(ids, vec!["people.2", "people.3", "people.4"]);
        stream.close().unwrap();
        stream.close().unwrap();
        drop(stream);
        assert_eq!(counters.closes(), 1);
    }

    #[test]
    fn first_error_ends_iteration() {
        let mut inner = VecReader::new(people_schema(), people(5));
        inner.fail_at = Some(2);
        let stream = FeatureStream::new(Box::new(inner));
        let results: Vec<_> = stream.collect();
        assert_eq!(results.len(), 3);
        assert!(matches!(results[2], Err(Error::Io(_))));
    }

    #[test]
    fn drop_closes_unclosed_stream() {
        let inner = VecReader::new(people_schema(), people(5));
        let counters = inner.counters.clone();
        let mut stream = FeatureStream::new(Box::new(inner));
        assert!(stream.next().is_some());
        drop(stream);
        assert_eq!(counters.closes(), 1);
    }

    #[test]
    fn collect_all_reports_the_read_error_over_close_error() {
        let mut inner = VecReader::new(people_schema(), people(5));
        inner.fail_at = Some(1);
        inner.fail_close = true;
        let counters = inner.counters.clone();
        let err = FeatureStream::new(Box::new(inner)).collect_all().unwrap_err();
        assert_eq!(err.to_string(), "I/O failure: disk on fire");
        assert_eq!(counters.closes(), 1);
    }

    #[test]
    fn close_after_a_failed_read_swallows_close_errors() {
        let mut inner = VecReader::new(people_schema(), people(3));
        inner.fail_at = Some(0);
        inner.fail_close = true;
        let counters = inner.counters.clone();
        let mut stream = FeatureStream::new(Box::new(inner));
        assert_eq!(stream.layers(), vec!["native"]);
        assert!(matches!(stream.next(), Some(Err(Error::Io(_)))));
        stream.close().unwrap();
        stream.close().unwrap();
        assert_eq!(counters.closes(), 1);
    }

    #[test]
    fn close_errors_surface_on_a_healthy_stream() {
        let mut inner = VecReader::new(people_schema(), people(2));
        inner.fail_close = true;
        let mut stream = FeatureStream::new(Box::new(inner));
        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(stream.close(), Err(Error::Io(_))));
    }
}
