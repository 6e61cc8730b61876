//! In-memory predicate evaluation.
//!
//! A [`Predicate`] is compiled once against a [`Schema`]: property names are
//! resolved to positions, literals are coerced to the type of the attribute
//! they meet, and LIKE patterns become anchored regexes. Evaluation is then a
//! pure walk over the compiled tree.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use geoquery_core::filter::{tokenize_like, LikeToken};
use geoquery_core::prelude::*;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct PredicateEvaluator {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Const(bool),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Compare {
        op: ComparisonOp,
        left: Expr,
        right: Expr,
        fold_case: bool,
    },
    Between {
        expr: Expr,
        lower: Expr,
        upper: Expr,
    },
    Like {
        expr: Expr,
        regex: Regex,
    },
    IsNull(Expr),
    Id(BTreeSet<FeatureId>),
    Spatial {
        op: SpatialOperator,
        property: Expr,
        envelope: Envelope,
        distance: f64,
    },
}

#[derive(Debug, Clone)]
enum Expr {
    Attr(usize),
    Const(Value),
    Arith {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: Builtin,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Builtin {
    Lower,
    Upper,
    Abs,
    Length,
    Area,
}

impl Builtin {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "lower" | "strToLowerCase" => Builtin::Lower,
            "upper" | "strToUpperCase" => Builtin::Upper,
            "abs" => Builtin::Abs,
            "length" | "strLength" => Builtin::Length,
            "area" => Builtin::Area,
            _ => return None,
        })
    }
}

impl PredicateEvaluator {
    /// Fails with `SchemaMismatch` for unknown attributes and
    /// `UnsupportedFunction` for functions outside the built-in set.
    pub fn compile(predicate: &Predicate, schema: &Schema) -> Result<Self> {
        Ok(Self {
            root: compile_node(predicate, schema)?,
        })
    }

    /// True when every feature passes without looking at it.
    pub fn is_trivial(&self) -> bool {
        matches!(self.root, Node::Const(true))
    }

    pub fn matches(&self, feature: &Feature) -> Result<bool> {
        eval_node(&self.root, feature)
    }
}

fn compile_node(predicate: &Predicate, schema: &Schema) -> Result<Node> {
    Ok(match predicate {
        Predicate::Include => Node::Const(true),
        Predicate::Exclude => Node::Const(false),
        Predicate::And(children) => Node::And(
            children
                .iter()
                .map(|c| compile_node(c, schema))
                .collect::<Result<_>>()?,
        ),
        Predicate::Or(children) => Node::Or(
            children
                .iter()
                .map(|c| compile_node(c, schema))
                .collect::<Result<_>>()?,
        ),
        Predicate::Not(child) => Node::Not(Box::new(compile_node(child, schema)?)),
        Predicate::Comparison {
            op,
            left,
            right,
            match_case,
        } => Node::Compare {
            op: *op,
            left: compile_expr(left, schema, right.value_type(Some(schema)))?,
            right: compile_expr(right, schema, left.value_type(Some(schema)))?,
            fold_case: !match_case,
        },
        Predicate::Between { expr, lower, upper } => {
            let hint = expr.value_type(Some(schema));
            Node::Between {
                expr: compile_expr(expr, schema, None)?,
                lower: compile_expr(lower, schema, hint)?,
                upper: compile_expr(upper, schema, hint)?,
            }
        }
        Predicate::Like {
            expr,
            pattern,
            wildcard,
            single_char,
            escape,
            match_case,
        } => Node::Like {
            expr: compile_expr(expr, schema, None)?,
            regex: like_regex(pattern, *wildcard, *single_char, *escape, *match_case)?,
        },
        Predicate::IsNull(expr) => Node::IsNull(compile_expr(expr, schema, None)?),
        Predicate::Id(ids) => Node::Id(ids.clone()),
        Predicate::Spatial {
            op,
            property,
            geometry,
            distance,
        } => Node::Spatial {
            op: *op,
            property: compile_expr(property, schema, None)?,
            envelope: geometry
                .bounds()
                .ok_or_else(|| Error::Evaluation(format!("empty geometry operand for {op}")))?,
            distance: distance.unwrap_or(0.0),
        },
    })
}

fn compile_expr(expr: &Expression, schema: &Schema, hint: Option<ValueType>) -> Result<Expr> {
    Ok(match expr {
        Expression::Property(name) => Expr::Attr(schema.index_of(name).ok_or_else(|| {
            Error::schema(format!(
                "attribute '{name}' is not declared by '{}'",
                schema.type_name()
            ))
        })?),
        Expression::Literal(v) => Expr::Const(match hint {
            Some(t) => v.coerce(t),
            None => v.clone(),
        }),
        Expression::Arithmetic { op, left, right } => Expr::Arith {
            op: *op,
            left: Box::new(compile_expr(left, schema, None)?),
            right: Box::new(compile_expr(right, schema, None)?),
        },
        Expression::Function { name, args } => {
            let func =
                Builtin::lookup(name).ok_or_else(|| Error::UnsupportedFunction(name.clone()))?;
            if args.len() != 1 {
                return Err(Error::UnsupportedFunction(format!(
                    "{name} with {} arguments",
                    args.len()
                )));
            }
            Expr::Call {
                func,
                args: args
                    .iter()
                    .map(|a| compile_expr(a, schema, None))
                    .collect::<Result<_>>()?,
            }
        }
    })
}

fn like_regex(
    pattern: &str,
    wildcard: char,
    single_char: char,
    escape: char,
    match_case: bool,
) -> Result<Regex> {
    let mut re = String::from(if match_case { "(?s)^" } else { "(?si)^" });
    for token in tokenize_like(pattern, wildcard, single_char, escape) {
        match token {
            LikeToken::Any => re.push_str(".*"),
            LikeToken::One => re.push('.'),
            LikeToken::Literal(c) => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| Error::Evaluation(format!("bad LIKE pattern '{pattern}': {e}")))
}

fn eval_node(node: &Node, feature: &Feature) -> Result<bool> {
    match node {
        Node::Const(b) => Ok(*b),
        Node::And(children) => {
            for c in children {
                if !eval_node(c, feature)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Node::Or(children) => {
            for c in children {
                if eval_node(c, feature)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Node::Not(child) => Ok(!eval_node(child, feature)?),
        Node::Compare {
            op,
            left,
            right,
            fold_case,
        } => {
            let l = eval_expr(left, feature)?;
            let r = eval_expr(right, feature)?;
            Ok(compare(*op, &l, &r, *fold_case))
        }
        Node::Between { expr, lower, upper } => {
            let v = eval_expr(expr, feature)?;
            let lo = eval_expr(lower, feature)?;
            let hi = eval_expr(upper, feature)?;
            Ok(compare(ComparisonOp::Gte, &v, &lo, false) && compare(ComparisonOp::Lte, &v, &hi, false))
        }
        Node::Like { expr, regex } => match eval_expr(expr, feature)? {
            Value::Null => Ok(false),
            v => Ok(regex.is_match(&v.to_string())),
        },
        Node::IsNull(expr) => Ok(eval_expr(expr, feature)?.is_null()),
        Node::Id(ids) => Ok(ids.contains(&feature.id)),
        Node::Spatial {
            op,
            property,
            envelope,
            distance,
        } => {
            let value = eval_expr(property, feature)?;
            let Some(bounds) = value.as_geometry().and_then(|g| g.bounds()) else {
                return Ok(false);
            };
            Ok(spatial(*op, &bounds, envelope, *distance))
        }
    }
}

fn compare(op: ComparisonOp, l: &Value, r: &Value, fold_case: bool) -> bool {
    if l.is_null() || r.is_null() {
        return false;
    }
    let ord = match (l, r) {
        (Value::Str(a), Value::Str(b)) if fold_case => Some(a.to_lowercase().cmp(&b.to_lowercase())),
        _ => l.partial_cmp_value(r),
    };
    match op {
        ComparisonOp::Eq => ord == Some(Ordering::Equal),
        ComparisonOp::Neq => ord != Some(Ordering::Equal),
        ComparisonOp::Lt => ord == Some(Ordering::Less),
        ComparisonOp::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        ComparisonOp::Gt => ord == Some(Ordering::Greater),
        ComparisonOp::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Envelope approximation of the spatial operators. Exact for points and
/// axis-aligned rectangles.
fn spatial(op: SpatialOperator, a: &Envelope, b: &Envelope, distance: f64) -> bool {
    let crossing = a.intersects(b) && !a.contains(b) && !b.contains(a);
    match op {
        SpatialOperator::Bbox | SpatialOperator::Intersects => a.intersects(b),
        SpatialOperator::Contains => a.contains(b),
        SpatialOperator::Within => b.contains(a),
        SpatialOperator::Disjoint => !a.intersects(b),
        SpatialOperator::Touches => a.touches(b),
        SpatialOperator::Crosses => crossing,
        SpatialOperator::Overlaps => crossing && !a.touches(b),
        SpatialOperator::Equals => a == b,
        SpatialOperator::DWithin => a.distance(b) <= distance,
        SpatialOperator::Beyond => a.distance(b) > distance,
    }
}

fn eval_expr(expr: &Expr, feature: &Feature) -> Result<Value> {
    match expr {
        Expr::Attr(idx) => feature.get(*idx).cloned().ok_or_else(|| {
            Error::Evaluation(format!(
                "feature '{}' has no value at position {idx}",
                feature.id
            ))
        }),
        Expr::Const(v) => Ok(v.clone()),
        Expr::Arith { op, left, right } => {
            arithmetic(*op, eval_expr(left, feature)?, eval_expr(right, feature)?)
        }
        Expr::Call { func, args } => {
            let arg = match args.first() {
                Some(a) => eval_expr(a, feature)?,
                None => Value::Null,
            };
            call(*func, arg)
        }
    }
}

fn arithmetic(op: ArithmeticOp, l: Value, r: Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let out = match op {
            ArithmeticOp::Add => a.checked_add(*b),
            ArithmeticOp::Subtract => a.checked_sub(*b),
            ArithmeticOp::Multiply => a.checked_mul(*b),
            ArithmeticOp::Divide => a.checked_div(*b),
        };
        return out
            .map(Value::Int)
            .ok_or_else(|| Error::Evaluation(format!("integer overflow or division by zero in {a} {} {b}", op.symbol())));
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(Error::Evaluation(format!(
            "cannot apply '{}' to {l} and {r}",
            op.symbol()
        )));
    };
    Ok(Value::Double(match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Subtract => a - b,
        ArithmeticOp::Multiply => a * b,
        ArithmeticOp::Divide => a / b,
    }))
}

fn call(func: Builtin, arg: Value) -> Result<Value> {
    if arg.is_null() {
        return Ok(Value::Null);
    }
    Ok(match func {
        Builtin::Lower => Value::Str(arg.to_string().to_lowercase()),
        Builtin::Upper => Value::Str(arg.to_string().to_uppercase()),
        Builtin::Length => Value::Int(arg.to_string().chars().count() as i64),
        Builtin::Abs => match arg {
            Value::Int(i) => Value::Int(
                i.checked_abs()
                    .ok_or_else(|| Error::Evaluation(format!("abs({i}) overflows")))?,
            ),
            Value::Double(d) => Value::Double(d.abs()),
            other => return Err(Error::Evaluation(format!("abs() of non-number {other}"))),
        },
        Builtin::Area => match arg {
            Value::Geometry(g) => Value::Double(match &g.shape {
                Shape::Point(_) | Shape::LineString(_) => 0.0,
                Shape::Envelope(e) => e.area(),
                Shape::Polygon(rings) => polygon_area(rings),
            }),
            other => return Err(Error::Evaluation(format!("area() of non-geometry {other}"))),
        },
    })
}

/// Shoelace area: exterior ring minus holes.
fn polygon_area(rings: &[Vec<Coord>]) -> f64 {
    let ring_area = |ring: &Vec<Coord>| {
        let twice: f64 = ring
            .windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum();
        (twice / 2.0).abs()
    };
    let mut iter = rings.iter();
    let Some(shell) = iter.next() else {
        return 0.0;
    };
    iter.fold(ring_area(shell), |acc, hole| acc - ring_area(hole))
}
