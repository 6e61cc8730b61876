//! Lowering: split a resolved Query into the part the backend executes and
//! the decorator stages that complete it.
//!
//! Stages always run in the canonical order filter, reproject, offset,
//! limit, retype. A capability is only used natively when doing so keeps
//! that order observable:
//! - reprojection, offset and limit are pushed down only when the filter is
//!   native too, since the backend applies them before any decorator runs;
//! - a native limit under a decorated offset is widened by the offset;
//! - a native projection under a decorated filter is widened by the filter's
//!   properties and trimmed back by a retype stage.

use std::fmt;

use geoquery_core::prelude::*;
use geoquery_operators::PredicateEvaluator;

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Filter(Predicate),
    Reproject(Crs),
    Offset(usize),
    Limit(usize),
    Retype(Vec<String>),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Filter(_) => "filter",
            Stage::Reproject(_) => "reproject",
            Stage::Offset(_) => "offset",
            Stage::Limit(_) => "limit",
            Stage::Retype(_) => "retype",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Filter(p) => write!(f, "filter[{}]", p.property_names().join(", ")),
            Stage::Reproject(crs) => write!(f, "reproject({crs})"),
            Stage::Offset(n) => write!(f, "offset({n})"),
            Stage::Limit(n) => write!(f, "limit({n})"),
            Stage::Retype(names) => write!(f, "retype({})", names.join(", ")),
        }
    }
}

/// Native query plus decorator stages, innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelinePlan {
    pub native: Query,
    pub stages: Vec<Stage>,
    pub capabilities: Capabilities,
}

impl PipelinePlan {
    /// True when the backend runs the whole query itself.
    pub fn is_fully_native(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }
}

impl fmt::Display for PipelinePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.native;
        writeln!(f, "native query on '{}' (capabilities: {})", q.type_name, self.capabilities)?;
        let filter = if q.predicate.is_include() {
            "none".to_string()
        } else {
            format!("[{}]", q.predicate.property_names().join(", "))
        };
        writeln!(f, "  filter:     {filter}")?;
        let sort: Vec<String> = q
            .sort
            .iter()
            .map(|s| {
                let key = match &s.key {
                    SortKey::Property(p) => p.as_str(),
                    SortKey::Natural => "<natural>",
                };
                match s.order {
                    SortOrder::Ascending => format!("{key} asc"),
                    SortOrder::Descending => format!("{key} desc"),
                }
            })
            .collect();
        writeln!(f, "  sort:       {}", if sort.is_empty() { "none".into() } else { sort.join(", ") })?;
        writeln!(f, "  offset:     {}", q.start_index)?;
        match q.max_features {
            Some(m) => writeln!(f, "  max:        {m}")?,
            None => writeln!(f, "  max:        unbounded")?,
        }
        match &q.properties {
            Some(p) => writeln!(f, "  properties: [{}]", p.join(", "))?,
            None => writeln!(f, "  properties: all")?,
        }
        if let Some(crs) = &q.target_crs {
            writeln!(f, "  crs:        {crs}")?;
        }
        if self.stages.is_empty() {
            write!(f, "decorators: none")
        } else {
            let stages: Vec<String> = self.stages.iter().map(|s| s.to_string()).collect();
            write!(f, "decorators: {}", stages.join(" -> "))
        }
    }
}

/// Decide native vs. decorated execution for every part of `query`.
///
/// `query` must already be resolved against `schema`. Every error this can
/// raise is raised here, before any backend resource exists.
pub fn lower(query: &Query, capabilities: Capabilities, schema: &Schema) -> Result<PipelinePlan> {
    for name in query.predicate.property_names() {
        if schema.index_of(name).is_none() {
            return Err(Error::schema(format!(
                "predicate references unknown attribute '{name}'"
            )));
        }
    }
    if let Some(names) = &query.properties {
        schema.project(names)?;
    }
    if let Some(crs) = &query.target_crs {
        schema.require_geometry_crs(crs)?;
    }

    let mut sort = query.sort.clone();
    for s in &sort {
        if let SortKey::Property(p) = &s.key {
            if schema.index_of(p).is_none() {
                return Err(Error::schema(format!("sort references unknown attribute '{p}'")));
            }
        }
    }
    if !sort.is_empty() && !capabilities.sort {
        return Err(Error::UnsupportedSort(format!(
            "'{}' cannot sort natively and sorting is never emulated",
            schema.type_name()
        )));
    }
    if query.start_index > 0 && sort.is_empty() {
        if !capabilities.sort {
            return Err(Error::UnsupportedPaging(format!(
                "offset {} on '{}' needs a deterministic order but the backend cannot sort",
                query.start_index,
                schema.type_name()
            )));
        }
        sort.push(SortBy::natural());
    }

    let filter_native = capabilities.filter || query.predicate.is_include();
    let mut stages = Vec::new();
    let mut native = Query {
        type_name: query.type_name.clone(),
        predicate: Predicate::Include,
        properties: None,
        sort,
        max_features: None,
        start_index: 0,
        target_crs: None,
    };

    if filter_native {
        native.predicate = query.predicate.clone();
    } else {
        stages.push(Stage::Filter(query.predicate.clone()));
    }

    if let Some(crs) = &query.target_crs {
        if capabilities.reproject && filter_native {
            native.target_crs = Some(crs.clone());
        } else {
            stages.push(Stage::Reproject(crs.clone()));
        }
    }

    let offset_native = query.start_index == 0 || (capabilities.offset && filter_native);
    if offset_native {
        native.start_index = query.start_index;
    } else {
        stages.push(Stage::Offset(query.start_index));
    }

    if let Some(max) = query.max_features {
        if capabilities.limit && filter_native {
            native.max_features = Some(if offset_native {
                max
            } else {
                max.saturating_add(query.start_index)
            });
        } else {
            stages.push(Stage::Limit(max));
        }
    }

    if let Some(names) = &query.properties {
        if capabilities.retype {
            let mut pushed = names.clone();
            if !filter_native {
                for p in query.predicate.property_names() {
                    if !pushed.iter().any(|n| n == p) {
                        pushed.push(p.to_string());
                    }
                }
            }
            if pushed.len() != names.len() {
                stages.push(Stage::Retype(names.clone()));
            }
            native.properties = Some(pushed);
        } else {
            stages.push(Stage::Retype(names.clone()));
        }
    }

    // A decorated filter runs against whatever the backend hands back.
    if let Some(Stage::Filter(p)) = stages.first() {
        let native_schema = match &native.properties {
            Some(names) => schema.project(names)?,
            None => schema.clone(),
        };
        PredicateEvaluator::compile(p, &native_schema)?;
    }

    tracing::debug!(
        type_name = %query.type_name,
        capabilities = %capabilities,
        stages = ?stages.iter().map(Stage::name).collect::<Vec<_>>(),
        "lowered query"
    );

    Ok(PipelinePlan {
        native,
        stages,
        capabilities,
    })
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

    fn full_query() -> Query {
        Query::new("roads")
            .with_predicate(Predicate::equals("lanes", 2))
            .with_properties(["name"])
            .with_sort(vec![SortBy::asc("name")])
            .with_start_index(3)
            .with_max_features(10)
            .with_target_crs(Crs::epsg(3857))
    }

    #[test]
    fn everything_native_means_no_stages() {
        let plan = lower(&full_query(), Capabilities::all(), &roads()).unwrap();
        assert!(plan.is_fully_native());
        assert_eq!(plan.native.start_index, 3);
        assert_eq!(plan.native.max_features, Some(10));
        assert_eq!(plan.native.properties, Some(vec!["name".to_string()]));
    }

    #[test]
    fn nothing_native_uses_canonical_order() {
        let caps = Capabilities::none().with_sort(true);
        let plan = lower(&full_query(), caps, &roads()).unwrap();
        assert_eq!(
            plan.stage_names(),
            vec!["filter", "reproject", "offset", "limit", "retype"]
        );
        assert!(plan.native.predicate.is_include());
        assert_eq!(plan.native.sort, vec![SortBy::asc("name")]);
    }

    #[test]
    fn decorated_filter_keeps_window_out_of_the_backend() {
        let caps = Capabilities::all().with_filter(false);
        let plan = lower(&full_query(), caps, &roads()).unwrap();
        assert_eq!(plan.stage_names(), vec!["filter", "reproject", "offset", "limit", "retype"]);
        // native projection widened by the filter property
        assert_eq!(
            plan.native.properties,
            Some(vec!["name".to_string(), "lanes".to_string()])
        );
        assert_eq!(plan.native.start_index, 0);
        assert_eq!(plan.native.max_features, None);
        assert_eq!(plan.native.target_crs, None);
    }

    #[test]
    fn native_limit_under_decorated_offset_is_widened() {
        let caps = Capabilities::all().with_offset(false);
        let plan = lower(&full_query(), caps, &roads()).unwrap();
        assert_eq!(plan.stages, vec![Stage::Offset(3)]);
        assert_eq!(plan.native.max_features, Some(13));
    }

    #[test]
    fn offset_without_sort() {
        let q = Query::new("roads").with_start_index(2);
        let err = lower(&q, Capabilities::none(), &roads()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPaging(_)));

        let plan = lower(&q, Capabilities::none().with_sort(true), &roads()).unwrap();
        assert_eq!(plan.native.sort, vec![SortBy::natural()]);
        assert_eq!(plan.stages, vec![Stage::Offset(2)]);
    }

    #[test]
    fn sort_is_never_emulated() {
        let q = Query::new("roads").with_sort(vec![SortBy::asc("name")]);
        let err = lower(&q, Capabilities::all().with_sort(false), &roads()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSort(_)));
    }

    #[test]
    fn unknown_function_under_decorated_filter_fails_early() {
        let q = Query::new("roads").with_predicate(Predicate::compare(
            ComparisonOp::Eq,
            Expression::function("soundex", vec![Expression::property("name")]),
            Expression::literal("x"),
        ));
        let err = lower(&q, Capabilities::none(), &roads()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFunction(_)));
    }

    #[test]
    fn explain_output_lists_stages() {
        let caps = Capabilities::all().with_filter(false);
        let text = lower(&full_query(), caps, &roads()).unwrap().to_string();
        assert!(text.contains("native query on 'roads'"));
        assert!(text.contains("decorators: filter[lanes] -> reproject(EPSG:3857)"));
        assert!(text.contains("properties: [name, lanes]"));
    }
}
