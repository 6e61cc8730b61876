//! Retype decorator: positional projection onto a narrower schema.

use geoquery_core::prelude::{Error, Feature, Result, Schema, Value};

use crate::traits::{discard, BoxedReader, FeatureReader, Lifecycle};

/// Source position of every target attribute.
fn positions(source: &Schema, target: &Schema) -> Result<Vec<usize>> {
    if target.len() > source.len() {
        return Err(Error::schema(format!(
            "cannot retype '{}' from {} to {} attributes",
            source.type_name(),
            source.len(),
            target.len()
        )));
    }
    target
        .attributes()
        .iter()
        .map(|attr| {
            let idx = source.index_of(&attr.name).ok_or_else(|| {
                Error::schema(format!(
                    "retype target attribute '{}' is not in '{}'",
                    attr.name,
                    source.type_name()
                ))
            })?;
            let found = source.value_type_of(&attr.name);
            if found != Some(attr.value_type) {
                return Err(Error::schema(format!(
                    "retype target attribute '{}' is {} but the source declares {:?}",
                    attr.name, attr.value_type, found
                )));
            }
            Ok(idx)
        })
        .collect()
}

pub struct RetypeReader {
    inner: BoxedReader,
    target: Schema,
    mapping: Vec<usize>,
    state: Lifecycle,
}

impl RetypeReader {
    /// The target may only drop or reorder source attributes. Anything that
    /// would widen the schema fails with `SchemaMismatch`, after closing the
    /// inner reader.
    pub fn new(inner: BoxedReader, target: Schema) -> Result<Self> {
        let mapping = match positions(inner.schema(), &target) {
            Ok(mapping) => mapping,
            Err(e) => return Err(discard(inner, "retype", e)),
        };
        tracing::debug!(from = inner.schema().len(), to = target.len(), "retype decorator built");
        Ok(Self {
            inner,
            target,
            mapping,
            state: Lifecycle::default(),
        })
    }

    /// Retype to the named subset of the inner schema, in the given order.
    pub fn project(inner: BoxedReader, names: &[String]) -> Result<Self> {
        match inner.schema().project(names) {
            Ok(target) => Self::new(inner, target),
            Err(e) => Err(discard(inner, "retype", e)),
        }
    }

    fn retype(&self, feature: Feature) -> Feature {
        let values = self
            .mapping
            .iter()
            .map(|&i| feature.values.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        Feature::new(feature.id, values)
    }
}

impl FeatureReader for RetypeReader {
    fn schema(&self) -> &Schema {
        &self.target
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.state.is_closed() {
            return Ok(None);
        }
        let next = self.inner.next_feature();
        Ok(self.state.track(next)?.map(|f| self.retype(f)))
    }

    fn close(&mut self) -> Result<()> {
        self.state.close("retype", self.inner.as_mut())
    }

    fn name(&self) -> &'static str {
        "retype"
    }

    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.name()];
        layers.extend(self.inner.layers());
        layers
    }
}

#[cfg(test)]
mod tests {
    use geoquery_core::prelude::*;

    use super::*;
    use crate::traits::testing::{drain, people, people_schema, VecReader};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn projects_and_reorders() {
        let inner = VecReader::new(people_schema(), people(2));
        let mut reader = RetypeReader::project(Box::new(inner), &names(&["age", "name"])).unwrap();
        assert_eq!(reader.schema().names().collect::<Vec<_>>(), vec!["age", "name"]);
        let out = drain(&mut reader);
        assert_eq!(out[1].values, vec![Value::Int(21), Value::from("person-1")]);
        assert_eq!(out[1].id.as_str(), "people.1");
    }

    #[test]
    fn empty_projection_keeps_feature_count() {
        let inner = VecReader::new(people_schema(), people(4));
        let mut reader = RetypeReader::project(Box::new(inner), &[]).unwrap();
        let out = drain(&mut reader);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|f| f.is_empty()));
    }

    #[test]
    fn widening_is_rejected() {
        let wider = Schema::builder("people")
            .attribute("name", ValueType::String)
            .attribute("age", ValueType::Integer)
            .geometry("home", Some(Crs::epsg(4326)))
            .attribute("shoe_size", ValueType::Integer)
            .build()
            .unwrap();
        let inner = VecReader::new(people_schema(), people(1));
        let err = RetypeReader::new(Box::new(inner), wider).err().unwrap();
        assert!(matches!(err, Error::SchemaMismatch(_)));

        let renamed = Schema::builder("people")
            .attribute("nickname", ValueType::String)
            .build()
            .unwrap();
        let inner = VecReader::new(people_schema(), people(1));
        let err = RetypeReader::new(Box::new(inner), renamed).err().unwrap();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn type_change_is_rejected() {
        let retyped = Schema::builder("people")
            .attribute("age", ValueType::String)
            .build()
            .unwrap();
        let inner = VecReader::new(people_schema(), people(1));
        let err = RetypeReader::new(Box::new(inner), retyped).err().unwrap();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
