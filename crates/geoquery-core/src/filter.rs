//! Filter and expression trees.
//!
//! Closed sets of variants: consumers (the in-memory evaluator, the SQL
//! compiler) match exhaustively, so adding a node is a compile error until
//! every consumer handles it. Trees are immutable; rewrites build new trees.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Envelope, Geometry};
use crate::schema::{Schema, ValueType};
use crate::types::{FeatureId, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Property(String),
    Literal(Value),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn property(name: impl Into<String>) -> Self {
        Expression::Property(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            args,
        }
    }

    /// Static type of this expression against `schema`. Properties resolve to
    /// their declared type, literals to their runtime type. Used for literal
    /// coercion, never for evaluation.
    pub fn value_type(&self, schema: Option<&Schema>) -> Option<ValueType> {
        match self {
            Expression::Property(name) => schema?.value_type_of(name),
            Expression::Literal(v) => v.value_type(),
            Expression::Arithmetic { left, right, .. } => {
                let l = left.value_type(schema);
                let r = right.value_type(schema);
                match (l, r) {
                    (Some(ValueType::Integer), Some(ValueType::Integer)) => {
                        Some(ValueType::Integer)
                    }
                    _ => Some(ValueType::Double),
                }
            }
            Expression::Function { name, .. } => match name.as_str() {
                "lower" | "upper" | "strToLowerCase" | "strToUpperCase" => {
                    Some(ValueType::String)
                }
                "length" | "strLength" => Some(ValueType::Integer),
                "area" | "abs" => Some(ValueType::Double),
                _ => None,
            },
        }
    }

    fn collect_properties<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expression::Property(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expression::Literal(_) => {}
            Expression::Arithmetic { left, right, .. } => {
                left.collect_properties(out);
                right.collect_properties(out);
            }
            Expression::Function { args, .. } => {
                for a in args {
                    a.collect_properties(out);
                }
            }
        }
    }

    pub fn try_map_properties<E>(
        &self,
        f: &mut impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Expression, E> {
        Ok(match self {
            Expression::Property(name) => Expression::Property(f(name)?),
            Expression::Literal(v) => Expression::Literal(v.clone()),
            Expression::Arithmetic { op, left, right } => Expression::Arithmetic {
                op: *op,
                left: Box::new(left.try_map_properties(f)?),
                right: Box::new(right.try_map_properties(f)?),
            },
            Expression::Function { name, args } => Expression::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.try_map_properties(f))
                    .collect::<Result<_, E>>()?,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, ComparisonOp::Eq | ComparisonOp::Neq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialOperator {
    Bbox,
    Intersects,
    Contains,
    Within,
    Disjoint,
    Touches,
    Crosses,
    Overlaps,
    Equals,
    Beyond,
    DWithin,
}

impl SpatialOperator {
    pub const ALL: [SpatialOperator; 11] = [
        SpatialOperator::Bbox,
        SpatialOperator::Intersects,
        SpatialOperator::Contains,
        SpatialOperator::Within,
        SpatialOperator::Disjoint,
        SpatialOperator::Touches,
        SpatialOperator::Crosses,
        SpatialOperator::Overlaps,
        SpatialOperator::Equals,
        SpatialOperator::Beyond,
        SpatialOperator::DWithin,
    ];

    /// Beyond and DWithin take a distance operand.
    pub fn is_distance(self) -> bool {
        matches!(self, SpatialOperator::Beyond | SpatialOperator::DWithin)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpatialOperator::Bbox => "bbox",
            SpatialOperator::Intersects => "intersects",
            SpatialOperator::Contains => "contains",
            SpatialOperator::Within => "within",
            SpatialOperator::Disjoint => "disjoint",
            SpatialOperator::Touches => "touches",
            SpatialOperator::Crosses => "crosses",
            SpatialOperator::Overlaps => "overlaps",
            SpatialOperator::Equals => "equals",
            SpatialOperator::Beyond => "beyond",
            SpatialOperator::DWithin => "dwithin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        SpatialOperator::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for SpatialOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Include,
    Exclude,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        op: ComparisonOp,
        left: Expression,
        right: Expression,
        match_case: bool,
    },
    Between {
        expr: Expression,
        lower: Expression,
        upper: Expression,
    },
    Like {
        expr: Expression,
        pattern: String,
        wildcard: char,
        single_char: char,
        escape: char,
        match_case: bool,
    },
    IsNull(Expression),
    Id(BTreeSet<FeatureId>),
    Spatial {
        op: SpatialOperator,
        property: Expression,
        geometry: Geometry,
        /// Only set for `Beyond` and `DWithin`.
        distance: Option<f64>,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::Include
    }
}

impl Predicate {
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And(children)
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Predicate::Not(Box::new(child))
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Predicate::Comparison {
            op,
            left,
            right,
            match_case: true,
        }
    }

    pub fn compare_ignore_case(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Predicate::Comparison {
            op,
            left,
            right,
            match_case: false,
        }
    }

    /// `property = value`, case sensitive.
    pub fn equals(property: &str, value: impl Into<Value>) -> Self {
        Predicate::compare(
            ComparisonOp::Eq,
            Expression::property(property),
            Expression::literal(value),
        )
    }

    pub fn between(expr: Expression, lower: Expression, upper: Expression) -> Self {
        Predicate::Between { expr, lower, upper }
    }

    /// LIKE with the common `*`, `?` and `\` conventions.
    pub fn like(expr: Expression, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            expr,
            pattern: pattern.into(),
            wildcard: '*',
            single_char: '?',
            escape: '\\',
            match_case: true,
        }
    }

    pub fn is_null(expr: Expression) -> Self {
        Predicate::IsNull(expr)
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FeatureId>,
    {
        Predicate::Id(ids.into_iter().map(Into::into).collect())
    }

    pub fn spatial(op: SpatialOperator, property: &str, geometry: Geometry) -> Self {
        Predicate::Spatial {
            op,
            property: Expression::property(property),
            geometry,
            distance: None,
        }
    }

    pub fn bbox(property: &str, envelope: Envelope) -> Self {
        Predicate::spatial(SpatialOperator::Bbox, property, Geometry::envelope(envelope))
    }

    pub fn dwithin(property: &str, geometry: Geometry, distance: f64) -> Self {
        Predicate::Spatial {
            op: SpatialOperator::DWithin,
            property: Expression::property(property),
            geometry,
            distance: Some(distance),
        }
    }

    pub fn beyond(property: &str, geometry: Geometry, distance: f64) -> Self {
        Predicate::Spatial {
            op: SpatialOperator::Beyond,
            property: Expression::property(property),
            geometry,
            distance: Some(distance),
        }
    }

    /// Conjunction with `Include` as identity and `Exclude` as absorbing
    /// element. Nested `And`s are flattened.
    pub fn conjoin(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Include, p) | (p, Predicate::Include) => p,
            (Predicate::Exclude, _) | (_, Predicate::Exclude) => Predicate::Exclude,
            (a, b) => {
                let mut children = Vec::new();
                for p in [a, b] {
                    match p {
                        Predicate::And(inner) => children.extend(inner),
                        other => children.push(other),
                    }
                }
                Predicate::And(children)
            }
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, Predicate::Include)
    }

    /// Distinct property names referenced anywhere in the tree, in first-seen order.
    pub fn property_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_properties(&mut out);
        out
    }

    fn collect_properties<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Include | Predicate::Exclude | Predicate::Id(_) => {}
            Predicate::And(children) | Predicate::Or(children) => {
                for c in children {
                    c.collect_properties(out);
                }
            }
            Predicate::Not(child) => child.collect_properties(out),
            Predicate::Comparison { left, right, .. } => {
                left.collect_properties(out);
                right.collect_properties(out);
            }
            Predicate::Between { expr, lower, upper } => {
                expr.collect_properties(out);
                lower.collect_properties(out);
                upper.collect_properties(out);
            }
            Predicate::Like { expr, .. } | Predicate::IsNull(expr) => {
                expr.collect_properties(out)
            }
            Predicate::Spatial { property, .. } => property.collect_properties(out),
        }
    }

    /// Rebuild the tree with every property name passed through `f`.
    pub fn try_map_properties<E>(
        &self,
        f: &mut impl FnMut(&str) -> Result<String, E>,
    ) -> Result<Predicate, E> {
        Ok(match self {
            Predicate::Include => Predicate::Include,
            Predicate::Exclude => Predicate::Exclude,
            Predicate::And(children) => Predicate::And(
                children
                    .iter()
                    .map(|c| c.try_map_properties(f))
                    .collect::<Result<_, E>>()?,
            ),
            Predicate::Or(children) => Predicate::Or(
                children
                    .iter()
                    .map(|c| c.try_map_properties(f))
                    .collect::<Result<_, E>>()?,
            ),
            Predicate::Not(child) => Predicate::Not(Box::new(child.try_map_properties(f)?)),
            Predicate::Comparison {
                op,
                left,
                right,
                match_case,
            } => Predicate::Comparison {
                op: *op,
                left: left.try_map_properties(f)?,
                right: right.try_map_properties(f)?,
                match_case: *match_case,
            },
            Predicate::Between { expr, lower, upper } => Predicate::Between {
                expr: expr.try_map_properties(f)?,
                lower: lower.try_map_properties(f)?,
                upper: upper.try_map_properties(f)?,
            },
            Predicate::Like {
                expr,
                pattern,
                wildcard,
                single_char,
                escape,
                match_case,
            } => Predicate::Like {
                expr: expr.try_map_properties(f)?,
                pattern: pattern.clone(),
                wildcard: *wildcard,
                single_char: *single_char,
                escape: *escape,
                match_case: *match_case,
            },
            Predicate::IsNull(expr) => Predicate::IsNull(expr.try_map_properties(f)?),
            Predicate::Id(ids) => Predicate::Id(ids.clone()),
            Predicate::Spatial {
                op,
                property,
                geometry,
                distance,
            } => Predicate::Spatial {
                op: *op,
                property: property.try_map_properties(f)?,
                geometry: geometry.clone(),
                distance: *distance,
            },
        })
    }
}

/// One element of a LIKE pattern after wildcard and escape handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToken {
    Literal(char),
    /// Any run of characters, including none.
    Any,
    /// Exactly one character.
    One,
}

/// Split a LIKE pattern into tokens. An escaped character is always a
/// literal, even when it is one of the wildcards; a trailing lone escape is
/// kept as a literal.
pub fn tokenize_like(pattern: &str, wildcard: char, single_char: char, escape: char) -> Vec<LikeToken> {
    let mut out = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            out.push(LikeToken::Literal(chars.next().unwrap_or(escape)));
        } else if c == wildcard {
            out.push(LikeToken::Any);
        } else if c == single_char {
            out.push(LikeToken::One);
        } else {
            out.push(LikeToken::Literal(c));
        }
    }
    out
}
