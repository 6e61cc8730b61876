//! Coordinate transform interfaces.
//!
//! Projection math is supplied from outside. The pipeline only needs to ask
//! a provider for a transform between two CRS identifiers and push
//! coordinates through it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::geometry::{Coord, Geometry};

pub trait CoordinateTransform: Send + Sync {
    fn transform(&self, coord: Coord) -> Result<Coord>;

    /// New geometry with every coordinate transformed, tagged with `target`.
    fn transform_geometry(&self, geometry: &Geometry, target: &Crs) -> Result<Geometry> {
        let mut out = geometry.map_coords(|c| self.transform(c))?;
        out.crs = Some(target.clone());
        Ok(out)
    }
}

pub trait TransformProvider: Send + Sync {
    /// Fails with [`Error::NoTransformAvailable`] when no path exists.
    fn find_transform(&self, source: &Crs, target: &Crs) -> Result<Arc<dyn CoordinateTransform>>;
}

pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn transform(&self, coord: Coord) -> Result<Coord> {
        Ok(coord)
    }
}

/// Transform backed by a plain function; handy for affine or lookup-table
/// projections supplied by callers.
pub struct FnTransform<F>(pub F);

impl<F> CoordinateTransform for FnTransform<F>
where
    F: Fn(Coord) -> Result<Coord> + Send + Sync,
{
    fn transform(&self, coord: Coord) -> Result<Coord> {
        (self.0)(coord)
    }
}

/// Provider over an explicit table of (source, target) transforms.
/// Identical source and target always resolve to the identity.
#[derive(Default, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<(Crs, Crs), Arc<dyn CoordinateTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        source: Crs,
        target: Crs,
        transform: Arc<dyn CoordinateTransform>,
    ) -> &mut Self {
        self.transforms.insert((source, target), transform);
        self
    }

    pub fn register_fn<F>(&mut self, source: Crs, target: Crs, f: F) -> &mut Self
    where
        F: Fn(Coord) -> Result<Coord> + Send + Sync + 'static,
    {
        self.register(source, target, Arc::new(FnTransform(f)))
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.transforms.keys()).finish()
    }
}

impl TransformProvider for TransformRegistry {
    fn find_transform(&self, source: &Crs, target: &Crs) -> Result<Arc<dyn CoordinateTransform>> {
        if source == target {
            return Ok(Arc::new(IdentityTransform));
        }
        self.transforms
            .get(&(source.clone(), target.clone()))
            .cloned()
            .ok_or_else(|| Error::NoTransformAvailable {
                from: source.clone(),
                to: target.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_for_same_crs() {
        let registry = TransformRegistry::new();
        let t = registry
            .find_transform(&Crs::epsg(4326), &Crs::epsg(4326))
            .unwrap();
        assert_eq!(t.transform(Coord::new(1.0, 2.0)).unwrap(), Coord::new(1.0, 2.0));
    }

    #[test]
    fn missing_path_is_an_error() {
        let registry = TransformRegistry::new();
        let err = registry
            .find_transform(&Crs::epsg(4326), &Crs::epsg(3857))
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoTransformAvailable { .. }));
    }

    #[test]
    fn registered_transform_tags_target_crs() {
        let mut registry = TransformRegistry::new();
        registry.register_fn(Crs::epsg(4326), Crs::epsg(3857), |c| {
            Ok(Coord::new(c.x * 2.0, c.y * 2.0))
        });
        let t = registry
            .find_transform(&Crs::epsg(4326), &Crs::epsg(3857))
            .unwrap();
        let g = t
            .transform_geometry(&Geometry::point(1.0, 1.5), &Crs::epsg(3857))
            .unwrap();
        assert_eq!(g, Geometry::point(2.0, 3.0).with_crs(Crs::epsg(3857)));
    }
}
