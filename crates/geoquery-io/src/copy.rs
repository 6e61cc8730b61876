//! Bulk copy from a feature stream into a writer.

use std::io::Write;

use geoquery_core::prelude::*;
use geoquery_operators::{FeatureStream, MaxFeaturesIter};

use crate::writers::jsonl::JsonlWriter;

/// Copy at most `max` features (all when `None`) and close the stream.
/// Returns the number written. A read error wins over a close error.
pub fn copy_features<W: Write>(
    stream: FeatureStream,
    writer: &mut JsonlWriter<W>,
    max: Option<usize>,
) -> Result<usize> {
    let schema = stream.schema().clone();
    let mut bounded = MaxFeaturesIter::new(stream, max.unwrap_or(usize::MAX));
    let copied = bounded.by_ref().try_for_each(|feature| {
        let feature = feature?;
        writer.write_feature(&schema, &feature)
    });
    let count = bounded.yielded();
    let mut stream = bounded.into_inner();
    match copied {
        Ok(()) => {
            stream.close()?;
            writer.flush()?;
            tracing::debug!(type_name = %schema.type_name(), count, "copied features");
            Ok(count)
        }
        Err(e) => {
            if let Err(close_err) = stream.close() {
                tracing::warn!(error = %close_err, "close failed after copy error");
            }
            Err(e)
        }
    }
}
