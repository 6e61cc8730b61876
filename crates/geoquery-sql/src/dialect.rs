//! SQL dialects: the extension point for spatial predicates.

use geoquery_core::prelude::{Error, Result, SpatialOperator};

/// Backend-specific SQL. Operands arrive already rendered; in the prepared
/// strategy the geometry operand is a placeholder whose value has been
/// recorded by the compiler.
pub trait SqlDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wrap a rendered geometry operand (quoted WKT or `?`) so the database
    /// reads it as a geometry in `srid`.
    fn geometry_operand(&self, operand: &str, srid: i32) -> String {
        let _ = srid;
        operand.to_string()
    }

    /// `property <op> geometry`. The base behaviour has no spatial SQL.
    fn spatial(
        &self,
        op: SpatialOperator,
        property: &str,
        geometry: &str,
        distance: Option<f64>,
    ) -> Result<String> {
        let _ = (property, geometry, distance);
        Err(Error::UnsupportedSpatialOperator(op))
    }
}

/// Portable SQL only; every spatial operator is unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseDialect;

impl SqlDialect for BaseDialect {
    fn name(&self) -> &'static str {
        "base"
    }
}

/// PostGIS-style `ST_*` functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgisDialect;

impl SqlDialect for PostgisDialect {
    fn name(&self) -> &'static str {
        "postgis"
    }

    fn geometry_operand(&self, operand: &str, srid: i32) -> String {
        format!("ST_GeomFromText({operand}, {srid})")
    }

    fn spatial(
        &self,
        op: SpatialOperator,
        property: &str,
        geometry: &str,
        distance: Option<f64>,
    ) -> Result<String> {
        let d = distance.unwrap_or(0.0);
        Ok(match op {
            SpatialOperator::Bbox => format!("{property} && {geometry}"),
            SpatialOperator::Intersects => format!("ST_Intersects({property}, {geometry})"),
            SpatialOperator::Contains => format!("ST_Contains({property}, {geometry})"),
            SpatialOperator::Within => format!("ST_Within({property}, {geometry})"),
            SpatialOperator::Disjoint => format!("ST_Disjoint({property}, {geometry})"),
            SpatialOperator::Touches => format!("ST_Touches({property}, {geometry})"),
            SpatialOperator::Crosses => format!("ST_Crosses({property}, {geometry})"),
            SpatialOperator::Overlaps => format!("ST_Overlaps({property}, {geometry})"),
            SpatialOperator::Equals => format!("ST_Equals({property}, {geometry})"),
            SpatialOperator::DWithin => format!("ST_DWithin({property}, {geometry}, {d})"),
            SpatialOperator::Beyond => format!("NOT ST_DWithin({property}, {geometry}, {d})"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_rejects_every_spatial_operator() {
        for op in SpatialOperator::ALL {
            let err = BaseDialect.spatial(op, "geom", "?", None).unwrap_err();
            assert!(matches!(err, Error::UnsupportedSpatialOperator(o) if o == op));
        }
    }

    #[test]
    fn postgis_covers_every_operator() {
        for op in SpatialOperator::ALL {
            assert!(PostgisDialect.spatial(op, "geom", "g", Some(5.0)).is_ok());
        }
        assert_eq!(
            PostgisDialect.spatial(SpatialOperator::Beyond, "geom", "g", Some(5.0)).unwrap(),
            "NOT ST_DWithin(geom, g, 5)"
        );
        assert_eq!(PostgisDialect.geometry_operand("?", 4326), "ST_GeomFromText(?, 4326)");
    }
}
