//! Coordinate reference system identifiers.
//!
//! CRS math lives outside this crate; here a CRS is only a stable identifier
//! such as `EPSG:4326` that transform providers and SQL backends key on.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Shorthand for `EPSG:<code>`.
    pub fn epsg(code: i32) -> Self {
        Self(format!("EPSG:{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric spatial reference id, taken from the trailing integer code
    /// (`EPSG:4326`, `urn:ogc:def:crs:EPSG::3857`, `4326`).
    pub fn srid(&self) -> Option<i32> {
        let tail = self
            .0
            .rsplit(|c: char| c == ':' || c == '/' || c == '#')
            .next()?;
        tail.trim().parse().ok()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Crs {
    fn from(s: &str) -> Self {
        Crs::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srid_from_common_forms() {
        assert_eq!(Crs::epsg(4326).srid(), Some(4326));
        assert_eq!(Crs::new("urn:ogc:def:crs:EPSG::3857").srid(), Some(3857));
        assert_eq!(Crs::new("http://www.opengis.net/gml/srs/epsg.xml#27700").srid(), Some(27700));
        assert_eq!(Crs::new("4326").srid(), Some(4326));
        assert_eq!(Crs::new("CRS:84").srid(), Some(84));
        assert_eq!(Crs::new("local").srid(), None);
    }
}
