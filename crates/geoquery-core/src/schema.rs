//! Feature schemas: an ordered list of attribute descriptors under a type name.
//!
//! Insertion order matters. Features store their values positionally, and
//! retyping maps target positions back onto source positions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    Geometry,
}

impl ValueType {
    pub fn is_string_like(self) -> bool {
        matches!(self, ValueType::String)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Double)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_lowercase().as_str() {
            "string" | "str" | "utf8" | "text" => ValueType::String,
            "integer" | "int" | "long" | "i64" => ValueType::Integer,
            "double" | "float" | "f64" | "number" => ValueType::Double,
            "boolean" | "bool" => ValueType::Boolean,
            "date" => ValueType::Date,
            "geometry" | "geom" => ValueType::Geometry,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Double => "double",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::Geometry => "geometry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// Only meaningful for geometry attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Crs>,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            crs: None,
        }
    }

    pub fn geometry(name: impl Into<String>, crs: Option<Crs>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::Geometry,
            crs,
        }
    }

    pub fn is_geometry(&self) -> bool {
        self.value_type == ValueType::Geometry
    }
}

/// Immutable once built. Construct through [`Schema::new`] or [`Schema::builder`],
/// both of which reject duplicate attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    type_name: String,
    attributes: Vec<AttributeDescriptor>,
    default_geometry: Option<usize>,
}

impl Schema {
    pub fn new(type_name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Result<Self> {
        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(Error::schema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
        }
        let default_geometry = attributes.iter().position(|a| a.is_geometry());
        Ok(Self {
            type_name: type_name.into(),
            attributes,
            default_geometry,
        })
    }

    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            type_name: type_name.into(),
            attributes: Vec::new(),
            default_geometry: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attribute(&self, idx: usize) -> Option<&AttributeDescriptor> {
        self.attributes.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn value_type_of(&self, name: &str) -> Option<ValueType> {
        self.get(name).map(|a| a.value_type)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    pub fn default_geometry(&self) -> Option<&AttributeDescriptor> {
        self.default_geometry.and_then(|i| self.attributes.get(i))
    }

    pub fn default_geometry_index(&self) -> Option<usize> {
        self.default_geometry
    }

    /// CRS declared on the default geometry attribute.
    pub fn geometry_crs(&self) -> Option<&Crs> {
        self.default_geometry().and_then(|a| a.crs.as_ref())
    }

    /// Positions of every geometry attribute, in schema order.
    pub fn geometry_indices(&self) -> Vec<usize> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_geometry())
            .map(|(i, _)| i)
            .collect()
    }

    /// Fails with `SchemaMismatch` if a geometry attribute declares no CRS,
    /// since nothing could then be reprojected from it.
    pub fn require_geometry_crs(&self, target: &Crs) -> Result<()> {
        match self.attributes.iter().find(|a| a.is_geometry() && a.crs.is_none()) {
            Some(a) => Err(Error::schema(format!(
                "geometry attribute '{}' of '{}' declares no CRS to reproject to {target} from",
                a.name, self.type_name
            ))),
            None => Ok(()),
        }
    }

    /// Narrow/reorder to `names`. Never widens: every name must exist here.
    pub fn project(&self, names: &[String]) -> Result<Schema> {
        let mut attributes = Vec::with_capacity(names.len());
        for name in names {
            let attr = self.get(name).ok_or_else(|| {
                Error::schema(format!(
                    "attribute '{}' not found in '{}'",
                    name, self.type_name
                ))
            })?;
            attributes.push(attr.clone());
        }
        let mut schema = Schema::new(self.type_name.clone(), attributes)?;
        // Keep the source's default geometry when it survives the projection.
        if let Some(default) = self.default_geometry() {
            if let Some(pos) = schema.index_of(&default.name) {
                schema.default_geometry = Some(pos);
            }
        }
        Ok(schema)
    }

    /// Same schema with every geometry attribute re-declared in `crs`.
    pub fn with_geometry_crs(&self, crs: &Crs) -> Schema {
        let mut out = self.clone();
        for attr in out.attributes.iter_mut().filter(|a| a.is_geometry()) {
            attr.crs = Some(crs.clone());
        }
        out
    }
}

pub struct SchemaBuilder {
    type_name: String,
    attributes: Vec<AttributeDescriptor>,
    default_geometry: Option<String>,
}

impl SchemaBuilder {
    pub fn attribute(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.attributes.push(AttributeDescriptor::new(name, value_type));
        self
    }

    pub fn geometry(mut self, name: impl Into<String>, crs: Option<Crs>) -> Self {
        self.attributes.push(AttributeDescriptor::geometry(name, crs));
        self
    }

    /// Mark a geometry other than the first as the default one.
    pub fn default_geometry(mut self, name: impl Into<String>) -> Self {
        self.default_geometry = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut schema = Schema::new(self.type_name, self.attributes)?;
        if let Some(name) = self.default_geometry {
            let idx = schema
                .index_of(&name)
                .filter(|&i| schema.attributes[i].is_geometry())
                .ok_or_else(|| {
                    Error::schema(format!("default geometry '{name}' is not a geometry attribute"))
                })?;
            schema.default_geometry = Some(idx);
        }
        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roads() -> Schema {
        Schema::builder("roads")
            .attribute("name", ValueType::String)
            .attribute("lanes", ValueType::Integer)
            .geometry("geom", Some(Crs::epsg(4326)))
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Schema::builder("t")
            .attribute("a", ValueType::String)
            .attribute("a", ValueType::Integer)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn default_geometry_and_crs() {
        let schema = roads();
        assert_eq!(schema.default_geometry().unwrap().name, "geom");
        assert_eq!(schema.geometry_crs(), Some(&Crs::epsg(4326)));
        assert_eq!(schema.geometry_indices(), vec![2]);
    }

    #[test]
    fn reprojection_needs_a_declared_crs() {
        assert!(roads().require_geometry_crs(&Crs::epsg(3857)).is_ok());
        let bare = Schema::builder("t").geometry("g", None).build().unwrap();
        let err = bare.require_geometry_crs(&Crs::epsg(3857)).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn project_narrows_and_reorders() {
        let schema = roads();
        let out = schema
            .project(&["geom".to_string(), "name".to_string()])
            .unwrap();
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["geom", "name"]);
        assert_eq!(out.default_geometry_index(), Some(0));
    }

    #[test]
    fn project_unknown_attribute_fails() {
        let err = roads().project(&["width".to_string()]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn value_type_parse() {
        assert_eq!(ValueType::parse("Int"), Some(ValueType::Integer));
        assert_eq!(ValueType::parse("geometry"), Some(ValueType::Geometry));
        assert_eq!(ValueType::parse("blob"), None);
    }
}
