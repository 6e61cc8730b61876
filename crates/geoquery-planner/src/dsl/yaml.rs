//! YAML query documents.
//!
//! Example:
//! ```yaml
//! type_name: roads
//! schema:
//!   - { name: name,  type: string }
//!   - { name: lanes, type: integer }
//!   - { name: geom,  type: geometry, crs: "EPSG:4326" }
//! capabilities: { filter: false, sort: true }
//! query:
//!   filter:
//!     and:
//!       - gte: { left: { property: lanes }, right: 2 }
//!       - like: { expr: { property: name }, pattern: "Main*" }
//!   properties: [name, geom]
//!   sort: [ { property: name, order: desc } ]
//!   start_index: 5
//!   max_features: 10
//!   target_crs: "EPSG:3857"
//! ```

use serde::{Deserialize, Serialize};

use geoquery_core::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDocument {
    pub type_name: String,
    #[serde(default)]
    pub schema: Vec<AttributeDef>,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Overrides the `GEOQUERY_*` environment when present.
    #[serde(default)]
    pub config: Option<QueryConfig>,
    /// Defining query of a view the document queries through.
    #[serde(default)]
    pub view: Option<QuerySpec>,
    #[serde(default)]
    pub query: QuerySpec,
    /// JSONL data file for `run`.
    #[serde(default)]
    pub data: Option<String>,
    /// SQL table name; defaults to the type name.
    #[serde(default)]
    pub table: Option<String>,
    /// Key columns used to compile id filters to SQL.
    #[serde(default)]
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub crs: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpec {
    pub filter: Option<FilterDef>,
    pub properties: Option<Vec<String>>,
    pub sort: Vec<SortDef>,
    pub start_index: usize,
    pub max_features: Option<usize>,
    pub target_crs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortDef {
    /// Omitted means feature-id order.
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDef {
    Include,
    Exclude,
    And(Vec<FilterDef>),
    Or(Vec<FilterDef>),
    Not(Box<FilterDef>),
    Eq(CompareDef),
    Neq(CompareDef),
    Lt(CompareDef),
    Lte(CompareDef),
    Gt(CompareDef),
    Gte(CompareDef),
    Between(BetweenDef),
    Like(LikeDef),
    IsNull(ExprDef),
    Id(Vec<String>),
    Spatial(SpatialDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareDef {
    pub left: ExprDef,
    pub right: ExprDef,
    #[serde(default = "match_case_default")]
    pub match_case: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetweenDef {
    pub expr: ExprDef,
    pub lower: ExprDef,
    pub upper: ExprDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeDef {
    pub expr: ExprDef,
    pub pattern: String,
    #[serde(default = "wildcard_default")]
    pub wildcard: char,
    #[serde(default = "single_char_default")]
    pub single_char: char,
    #[serde(default = "escape_default")]
    pub escape: char,
    #[serde(default = "match_case_default")]
    pub match_case: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialDef {
    pub op: SpatialOperator,
    pub property: String,
    pub geometry: GeometryDef,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryDef {
    Point([f64; 2]),
    Line(Vec<[f64; 2]>),
    Polygon(Vec<Vec<[f64; 2]>>),
    /// `[min_x, min_y, max_x, max_y]`
    Envelope([f64; 4]),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprDef {
    Property {
        property: String,
    },
    Function {
        function: String,
        #[serde(default)]
        args: Vec<ExprDef>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<ExprDef>,
        right: Box<ExprDef>,
    },
    Literal(LiteralDef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralDef {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

fn match_case_default() -> bool {
    true
}

fn wildcard_default() -> char {
    '*'
}

fn single_char_default() -> char {
    '?'
}

fn escape_default() -> char {
    '\\'
}

/// Parse a YAML query document.
pub fn parse_query_document(yaml_src: &str) -> Result<QueryDocument> {
    serde_yaml::from_str(yaml_src).map_err(|e| Error::Config(format!("query document: {e}")))
}

impl QueryDocument {
    /// Fails with `Config` for an unknown attribute type and with
    /// `SchemaMismatch` for duplicate names.
    pub fn schema(&self) -> Result<Schema> {
        let mut builder = Schema::builder(self.type_name.clone());
        for attr in &self.schema {
            let value_type = ValueType::parse(&attr.value_type).ok_or_else(|| {
                Error::Config(format!(
                    "attribute '{}' has unknown type '{}'",
                    attr.name, attr.value_type
                ))
            })?;
            builder = if value_type == ValueType::Geometry {
                builder.geometry(attr.name.clone(), attr.crs.as_deref().map(Crs::from))
            } else {
                builder.attribute(attr.name.clone(), value_type)
            };
        }
        builder.build()
    }

    pub fn query(&self) -> Query {
        self.query.to_query(&self.type_name)
    }

    pub fn view_query(&self) -> Option<Query> {
        self.view.as_ref().map(|v| v.to_query(&self.type_name))
    }

    /// The document's `config` block, or the environment when it has none.
    pub fn effective_config(&self) -> QueryConfig {
        self.config.clone().unwrap_or_else(QueryConfig::from_env)
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.type_name)
    }
}

impl QuerySpec {
    pub fn to_query(&self, type_name: &str) -> Query {
        Query {
            type_name: type_name.to_string(),
            predicate: self
                .filter
                .as_ref()
                .map(FilterDef::to_predicate)
                .unwrap_or_default(),
            properties: self.properties.clone(),
            sort: self.sort.iter().map(SortDef::to_sort_by).collect(),
            max_features: self.max_features,
            start_index: self.start_index,
            target_crs: self.target_crs.as_deref().map(Crs::from),
        }
    }
}

impl SortDef {
    fn to_sort_by(&self) -> SortBy {
        SortBy {
            key: match &self.property {
                Some(p) => SortKey::Property(p.clone()),
                None => SortKey::Natural,
            },
            order: self.order.unwrap_or(SortOrder::Ascending),
        }
    }
}

impl FilterDef {
    pub fn to_predicate(&self) -> Predicate {
        let compare = |op: ComparisonOp, c: &CompareDef| Predicate::Comparison {
            op,
            left: c.left.to_expression(),
            right: c.right.to_expression(),
            match_case: c.match_case,
        };
        match self {
            FilterDef::Include => Predicate::Include,
            FilterDef::Exclude => Predicate::Exclude,
            FilterDef::And(children) => {
                Predicate::And(children.iter().map(FilterDef::to_predicate).collect())
            }
            FilterDef::Or(children) => {
                Predicate::Or(children.iter().map(FilterDef::to_predicate).collect())
            }
            FilterDef::Not(child) => Predicate::not(child.to_predicate()),
            FilterDef::Eq(c) => compare(ComparisonOp::Eq, c),
            FilterDef::Neq(c) => compare(ComparisonOp::Neq, c),
            FilterDef::Lt(c) => compare(ComparisonOp::Lt, c),
            FilterDef::Lte(c) => compare(ComparisonOp::Lte, c),
            FilterDef::Gt(c) => compare(ComparisonOp::Gt, c),
            FilterDef::Gte(c) => compare(ComparisonOp::Gte, c),
            FilterDef::Between(b) => Predicate::between(
                b.expr.to_expression(),
                b.lower.to_expression(),
                b.upper.to_expression(),
            ),
            FilterDef::Like(l) => Predicate::Like {
                expr: l.expr.to_expression(),
                pattern: l.pattern.clone(),
                wildcard: l.wildcard,
                single_char: l.single_char,
                escape: l.escape,
                match_case: l.match_case,
            },
            FilterDef::IsNull(e) => Predicate::is_null(e.to_expression()),
            FilterDef::Id(ids) => Predicate::ids(ids.iter().map(String::as_str)),
            FilterDef::Spatial(s) => {
                let mut geometry = s.geometry.to_geometry();
                if let Some(crs) = &s.crs {
                    geometry = geometry.with_crs(Crs::new(crs.as_str()));
                }
                Predicate::Spatial {
                    op: s.op,
                    property: Expression::property(s.property.as_str()),
                    geometry,
                    distance: s.distance,
                }
            }
        }
    }
}

impl GeometryDef {
    fn to_geometry(&self) -> Geometry {
        let coord = |c: &[f64; 2]| Coord::new(c[0], c[1]);
        match self {
            GeometryDef::Point(c) => Geometry::point(c[0], c[1]),
            GeometryDef::Line(cs) => Geometry::line(cs.iter().map(coord).collect()),
            GeometryDef::Polygon(rings) => Geometry::polygon(
                rings
                    .iter()
                    .map(|r| r.iter().map(coord).collect())
                    .collect(),
            ),
            GeometryDef::Envelope([x1, y1, x2, y2]) => {
                Geometry::envelope(Envelope::new(*x1, *y1, *x2, *y2))
            }
        }
    }
}

impl ExprDef {
    pub fn to_expression(&self) -> Expression {
        match self {
            ExprDef::Property { property } => Expression::property(property.as_str()),
            ExprDef::Function { function, args } => Expression::function(
                function.as_str(),
                args.iter().map(ExprDef::to_expression).collect(),
            ),
            ExprDef::Arithmetic { op, left, right } => {
                Expression::arithmetic(*op, left.to_expression(), right.to_expression())
            }
            ExprDef::Literal(lit) => Expression::Literal(match lit {
                LiteralDef::Null => Value::Null,
                LiteralDef::Bool(b) => Value::Bool(*b),
                LiteralDef::Int(i) => Value::Int(*i),
                LiteralDef::Double(d) => Value::Double(*d),
                LiteralDef::Str(s) => Value::Str(s.clone()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
type_name: roads
schema:
  - { name: name,  type: string }
  - { name: lanes, type: integer }
  - { name: geom,  type: geometry, crs: "EPSG:4326" }
capabilities: { filter: false, sort: true }
config: { identifier_escape: '"' }
query:
  filter:
    and:
      - gte: { left: { property: lanes }, right: 2 }
      - like: { expr: { property: name }, pattern: "Main*", match_case: false }
      - spatial: { op: bbox, property: geom, geometry: { envelope: [0, 0, 10, 10] } }
      - not: { is_null: { property: name } }
  properties: [name, geom]
  sort: [ { property: name, order: desc }, {} ]
  start_index: 5
  max_features: 10
  target_crs: "EPSG:3857"
"#;

    #[test]
    fn parses_full_document() {
        let doc = parse_query_document(DOC).unwrap();
        let schema = doc.schema().unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.geometry_crs(), Some(&Crs::epsg(4326)));
        assert!(doc.capabilities.sort && !doc.capabilities.filter && !doc.capabilities.limit);
        let config = doc.effective_config();
        assert_eq!(config.identifier_escape, "\"");
        assert_eq!(config.like_cast_type, "VARCHAR");

        let q = doc.query();
        assert_eq!(q.start_index, 5);
        assert_eq!(q.max_features, Some(10));
        assert_eq!(q.target_crs, Some(Crs::epsg(3857)));
        assert_eq!(q.sort, vec![SortBy::desc("name"), SortBy::natural()]);
        match &q.predicate {
            Predicate::And(children) => {
                assert_eq!(children.len(), 4);
                assert_eq!(
                    children[0],
                    Predicate::compare(
                        ComparisonOp::Gte,
                        Expression::property("lanes"),
                        Expression::literal(2)
                    )
                );
                assert!(matches!(children[1], Predicate::Like { match_case: false, wildcard: '*', .. }));
                assert_eq!(
                    children[2],
                    Predicate::bbox("geom", Envelope::new(0.0, 0.0, 10.0, 10.0))
                );
            }
            other => panic!("expected a conjunction, got {other:?}"),
        }
        assert_eq!(doc.table_name(), "roads");
    }

    #[test]
    fn minimal_document_defaults() {
        let doc = parse_query_document("type_name: t\n").unwrap();
        let q = doc.query();
        assert!(q.predicate.is_include());
        assert_eq!(q.properties, None);
        assert_eq!(doc.capabilities, Capabilities::none());
        assert!(doc.view_query().is_none());
    }

    #[test]
    fn literal_kinds() {
        let doc = parse_query_document(
            "type_name: t\nquery:\n  filter:\n    or:\n      - eq: { left: { property: a }, right: 1.5 }\n      - eq: { left: { property: a }, right: null }\n      - eq: { left: { property: a }, right: \"x\" }\n      - id: [t.1, t.2]\n      - exclude\n",
        )
        .unwrap();
        let Predicate::Or(children) = doc.query().predicate else {
            panic!("expected or");
        };
        assert_eq!(children[0], Predicate::equals("a", 1.5));
        assert_eq!(children[1], Predicate::equals("a", Value::Null));
        assert_eq!(children[2], Predicate::equals("a", "x"));
        assert_eq!(children[3], Predicate::ids(["t.1", "t.2"]));
        assert_eq!(children[4], Predicate::Exclude);
    }

    #[test]
    fn bad_documents_are_config_errors() {
        assert!(matches!(parse_query_document("query: ["), Err(Error::Config(_))));
        let doc = parse_query_document("type_name: t\nschema: [ { name: a, type: blob } ]\n").unwrap();
        assert!(matches!(doc.schema(), Err(Error::Config(_))));
    }
}
