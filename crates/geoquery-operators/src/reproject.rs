//! Reprojection decorator.
//!
//! Transforms are resolved once per declared geometry attribute when the
//! decorator is built. A feature whose geometry records a different CRS than
//! its attribute declares gets its own transform, resolved for that feature
//! alone.

use std::sync::Arc;

use geoquery_core::prelude::*;

use crate::traits::{discard, BoxedReader, FeatureReader, Lifecycle};

struct GeometrySlot {
    index: usize,
    declared: Crs,
    transform: Arc<dyn CoordinateTransform>,
}

fn resolve_slots(
    schema: &Schema,
    target: &Crs,
    provider: &dyn TransformProvider,
) -> Result<Vec<GeometrySlot>> {
    schema.require_geometry_crs(target)?;
    schema
        .geometry_indices()
        .into_iter()
        .filter_map(|index| {
            let declared = schema.attribute(index)?.crs.clone()?;
            Some((index, declared))
        })
        .map(|(index, declared)| {
            let transform = provider.find_transform(&declared, target)?;
            Ok(GeometrySlot {
                index,
                declared,
                transform,
            })
        })
        .collect()
}

pub struct ReprojectReader {
    inner: BoxedReader,
    schema: Schema,
    target: Crs,
    provider: Arc<dyn TransformProvider>,
    slots: Vec<GeometrySlot>,
    state: Lifecycle,
}

impl ReprojectReader {
    /// Fails with `SchemaMismatch` when a geometry attribute declares no CRS
    /// and with `NoTransformAvailable` when a declared CRS has no path to
    /// `target`. On failure the inner reader is closed.
    pub fn new(
        inner: BoxedReader,
        target: Crs,
        provider: Arc<dyn TransformProvider>,
    ) -> Result<Self> {
        let slots = match resolve_slots(inner.schema(), &target, provider.as_ref()) {
            Ok(slots) => slots,
            Err(e) => return Err(discard(inner, "reproject", e)),
        };
        let schema = inner.schema().with_geometry_crs(&target);
        tracing::debug!(target = %target, geometries = slots.len(), "reproject decorator built");
        Ok(Self {
            inner,
            schema,
            target,
            provider,
            slots,
            state: Lifecycle::default(),
        })
    }

    fn reproject(&self, mut feature: Feature) -> Result<Feature> {
        for slot in &self.slots {
            let Some(Value::Geometry(geometry)) = feature.values.get(slot.index) else {
                continue;
            };
            let source = geometry.crs.as_ref().unwrap_or(&slot.declared);
            let projected = if *source == slot.declared {
                slot.transform.transform_geometry(geometry, &self.target)
            } else {
                self.provider
                    .find_transform(source, &self.target)
                    .and_then(|t| t.transform_geometry(geometry, &self.target))
            };
            let projected = projected.map_err(|e| {
                Error::io(format!("reprojecting feature '{}': {e}", feature.id))
            })?;
            feature.values[slot.index] = Value::Geometry(projected);
        }
        Ok(feature)
    }
}

impl FeatureReader for ReprojectReader {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.state.is_closed() {
            return Ok(None);
        }
        let next = match self.inner.next_feature() {
            Ok(Some(feature)) => self.reproject(feature).map(Some),
            other => other,
        };
        self.state.track(next)
    }

    fn close(&mut self) -> Result<()> {
        self.state.close("reproject", self.inner.as_mut())
    }

    fn name(&self) -> &'static str {
        "reproject"
    }

    fn layers(&self) -> Vec<&'static str> {
        let mut layers = vec![self.name()];
        layers.extend(self.inner.layers());
        layers
    }
}
