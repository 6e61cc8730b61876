//! Property-name resolution.
//!
//! Callers may reference attributes through aliases or xpath-like paths
//! (`gml:name`, `feature/name`, `@name`, `name[1]`). Resolution rewrites
//! every such reference in the predicate, projection and sort list into a
//! plain schema attribute name, and fails with `SchemaMismatch` when no
//! attribute matches.

use std::collections::HashMap;

use geoquery_core::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct PropertyNameResolver {
    aliases: HashMap<String, String>,
}

impl PropertyNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, alias: impl Into<String>, name: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), name.into());
        self
    }

    /// Resolve one reference against `schema`.
    pub fn resolve_name(&self, reference: &str, schema: &Schema) -> Result<String> {
        if schema.index_of(reference).is_some() {
            return Ok(reference.to_string());
        }
        if let Some(target) = self.aliases.get(reference) {
            if schema.index_of(target).is_some() {
                return Ok(target.clone());
            }
        }
        let simple = simplify(reference);
        if schema.index_of(simple).is_some() {
            return Ok(simple.to_string());
        }
        Err(Error::schema(format!(
            "property '{reference}' does not resolve to an attribute of '{}'",
            schema.type_name()
        )))
    }

    /// Rewrite every property reference in `query`.
    pub fn resolve(&self, query: &Query, schema: &Schema) -> Result<Query> {
        let mut lookup = |name: &str| self.resolve_name(name, schema);
        let predicate = query.predicate.try_map_properties(&mut lookup)?;

        let properties = match &query.properties {
            None => None,
            Some(names) => {
                let mut out: Vec<String> = Vec::with_capacity(names.len());
                for n in names {
                    let resolved = self.resolve_name(n, schema)?;
                    if !out.contains(&resolved) {
                        out.push(resolved);
                    }
                }
                Some(out)
            }
        };

        let sort = query
            .sort
            .iter()
            .map(|s| {
                Ok(SortBy {
                    key: match &s.key {
                        SortKey::Property(p) => SortKey::Property(self.resolve_name(p, schema)?),
                        SortKey::Natural => SortKey::Natural,
                    },
                    order: s.order,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Query {
            predicate,
            properties,
            sort,
            ..query.clone()
        })
    }
}

/// Last path step, without namespace prefix, attribute marker or index.
fn simplify(reference: &str) -> &str {
    let step = reference.rsplit('/').next().unwrap_or(reference);
    let step = step.split('[').next().unwrap_or(step);
    let step = step.trim_start_matches('@');
    step.rsplit(':').next().unwrap_or(step).trim()
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
    fn simplifies_xpath_like_references() {
        assert_eq!(simplify("gml:name"), "name");
        assert_eq!(simplify("roads/topp:lanes[1]"), "lanes");
        assert_eq!(simplify("@name"), "name");
        assert_eq!(simplify("plain"), "plain");
    }

    #[test]
    fn resolves_predicate_projection_and_sort() {
        let resolver = PropertyNameResolver::new().with_alias("the_geom", "geom");
        let q = Query::new("roads")
            .with_predicate(Predicate::and(vec![
                Predicate::equals("gml:name", "Main"),
                Predicate::bbox("the_geom", Envelope::new(0.0, 0.0, 1.0, 1.0)),
            ]))
            .with_properties(["roads/name", "name", "lanes"])
            .with_sort(vec![SortBy::desc("@lanes")]);
        let resolved = resolver.resolve(&q, &roads()).unwrap();
        assert_eq!(resolved.predicate.property_names(), vec!["name", "geom"]);
        assert_eq!(
            resolved.properties,
            Some(vec!["name".to_string(), "lanes".to_string()])
        );
        assert_eq!(resolved.sort, vec![SortBy::desc("lanes")]);
    }

    #[test]
    fn unknown_reference_is_a_schema_mismatch() {
        let q = Query::new("roads").with_predicate(Predicate::equals("width", 3));
        let err = PropertyNameResolver::new().resolve(&q, &roads()).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));

        let q = Query::new("roads").with_sort(vec![SortBy::asc("width")]);
        assert!(PropertyNameResolver::new().resolve(&q, &roads()).is_err());
    }
}
