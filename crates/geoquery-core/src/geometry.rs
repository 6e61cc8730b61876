//! Immutable geometry values.
//!
//! Geometries are plain values: transforming one produces a new geometry and
//! never touches shared coordinate arrays. Topology beyond envelopes belongs to
//! external geometry libraries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crs::Crs;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Normalizes the corners so that min <= max on both axes.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    fn of_coords<'a>(coords: impl IntoIterator<Item = &'a Coord>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let mut env = Envelope::new(first.x, first.y, first.x, first.y);
        for c in iter {
            env.min_x = env.min_x.min(c.x);
            env.min_y = env.min_y.min(c.y);
            env.max_x = env.max_x.max(c.x);
            env.max_y = env.max_y.max(c.y);
        }
        Some(env)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Shared boundary but no shared interior.
    pub fn touches(&self, other: &Envelope) -> bool {
        if !self.intersects(other) {
            return false;
        }
        self.max_x == other.min_x
            || other.max_x == self.min_x
            || self.max_y == other.min_y
            || other.max_y == self.min_y
    }

    /// Euclidean distance between the closest points of two envelopes.
    pub fn distance(&self, other: &Envelope) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// The 5-point closed ring for this rectangle, clockwise from the lower
    /// left corner, first point repeated at the end.
    pub fn to_ring(&self) -> Vec<Coord> {
        vec![
            Coord::new(self.min_x, self.min_y),
            Coord::new(self.min_x, self.max_y),
            Coord::new(self.max_x, self.max_y),
            Coord::new(self.max_x, self.min_y),
            Coord::new(self.min_x, self.min_y),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Exterior ring first, then holes.
    Polygon(Vec<Vec<Coord>>),
    Envelope(Envelope),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
}

impl Geometry {
    pub fn new(shape: Shape) -> Self {
        Self { shape, crs: None }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self::new(Shape::Point(Coord::new(x, y)))
    }

    pub fn line(coords: Vec<Coord>) -> Self {
        Self::new(Shape::LineString(coords))
    }

    pub fn polygon(rings: Vec<Vec<Coord>>) -> Self {
        Self::new(Shape::Polygon(rings))
    }

    pub fn envelope(env: Envelope) -> Self {
        Self::new(Shape::Envelope(env))
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn is_envelope(&self) -> bool {
        matches!(self.shape, Shape::Envelope(_))
    }

    pub fn bounds(&self) -> Option<Envelope> {
        match &self.shape {
            Shape::Point(c) => Some(Envelope::new(c.x, c.y, c.x, c.y)),
            Shape::LineString(cs) => Envelope::of_coords(cs),
            Shape::Polygon(rings) => Envelope::of_coords(rings.iter().flatten()),
            Shape::Envelope(e) => Some(*e),
        }
    }

    /// Envelopes become polygons; any other shape is returned unchanged.
    pub fn to_polygon(&self) -> Geometry {
        match &self.shape {
            Shape::Envelope(e) => Geometry {
                shape: Shape::Polygon(vec![e.to_ring()]),
                crs: self.crs.clone(),
            },
            _ => self.clone(),
        }
    }

    /// New geometry with every coordinate passed through `f`. An envelope is
    /// materialized as a polygon first, since a transformed rectangle is not
    /// in general axis-aligned.
    pub fn map_coords<E>(&self, mut f: impl FnMut(Coord) -> Result<Coord, E>) -> Result<Geometry, E> {
        let shape = match &self.shape {
            Shape::Point(c) => Shape::Point(f(*c)?),
            Shape::LineString(cs) => {
                Shape::LineString(cs.iter().map(|c| f(*c)).collect::<Result<_, E>>()?)
            }
            Shape::Polygon(rings) => Shape::Polygon(
                rings
                    .iter()
                    .map(|r| r.iter().map(|c| f(*c)).collect::<Result<Vec<_>, E>>())
                    .collect::<Result<_, E>>()?,
            ),
            Shape::Envelope(e) => Shape::Polygon(vec![e
                .to_ring()
                .into_iter()
                .map(&mut f)
                .collect::<Result<_, E>>()?]),
        };
        Ok(Geometry {
            shape,
            crs: self.crs.clone(),
        })
    }
}

fn write_coords(f: &mut fmt::Formatter<'_>, coords: &[Coord]) -> fmt::Result {
    f.write_str("(")?;
    for (i, c) in coords.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{} {}", c.x, c.y)?;
    }
    f.write_str(")")
}

/// Well-known text. Envelopes are written as their polygon ring.
impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Point(c) => write!(f, "POINT ({} {})", c.x, c.y),
            Shape::LineString(cs) => {
                f.write_str("LINESTRING ")?;
                write_coords(f, cs)
            }
            Shape::Polygon(rings) => {
                f.write_str("POLYGON (")?;
                for (i, ring) in rings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_coords(f, ring)?;
                }
                f.write_str(")")
            }
            Shape::Envelope(e) => {
                f.write_str("POLYGON (")?;
                write_coords(f, &e.to_ring())?;
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ring_is_closed_and_clockwise() {
        let ring = Envelope::new(0.0, 0.0, 2.0, 1.0).to_ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        // Shoelace sum is negative for clockwise rings.
        let area2: f64 = ring
            .windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum();
        assert!(area2 < 0.0);
    }

    #[test]
    fn wkt_output() {
        assert_eq!(Geometry::point(1.0, 2.5).to_string(), "POINT (1 2.5)");
        let env = Geometry::envelope(Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(
            env.to_string(),
            "POLYGON ((0 0, 0 1, 1 1, 1 0, 0 0))"
        );
    }

    #[test]
    fn envelope_relations() {
        let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let b = Envelope::new(10.0, 0.0, 20.0, 10.0);
        let c = Envelope::new(2.0, 2.0, 3.0, 3.0);
        assert!(a.intersects(&b));
        assert!(a.touches(&b));
        assert!(a.contains(&c));
        assert!(!c.contains(&a));
        assert_eq!(a.distance(&Envelope::new(13.0, 14.0, 15.0, 15.0)), 5.0);
    }

    #[test]
    fn map_coords_materializes_envelopes() {
        let env = Geometry::envelope(Envelope::new(0.0, 0.0, 1.0, 1.0));
        let moved = env
            .map_coords(|c| Ok::<_, ()>(Coord::new(c.x + 1.0, c.y)))
            .unwrap();
        assert!(matches!(moved.shape, Shape::Polygon(_)));
        assert_eq!(moved.bounds(), Some(Envelope::new(1.0, 0.0, 2.0, 1.0)));
    }
}
