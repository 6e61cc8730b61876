//! Views: a source seen through a defining query.

use geoquery_core::prelude::*;
use geoquery_operators::{FeatureSource, FeatureStream};

use crate::assembler::PipelineAssembler;
use crate::lower::PipelinePlan;

/// A source restricted by a defining query. Every caller query is joined
/// with the defining one before planning.
pub struct FeatureView<S> {
    source: S,
    defining: Query,
    schema: Schema,
}

impl<S: FeatureSource> FeatureView<S> {
    /// Fails with `SchemaMismatch` when the defining projection names an
    /// attribute the source does not have.
    pub fn new(source: S, defining: Query) -> Result<Self> {
        let schema = match &defining.properties {
            Some(names) => source.schema().project(names)?,
            None => source.schema().clone(),
        };
        Ok(Self {
            source,
            defining,
            schema,
        })
    }

    /// Schema callers see: the source schema narrowed by the defining query.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn defining_query(&self) -> &Query {
        &self.defining
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The query the source actually receives for `caller`.
    pub fn join(&self, caller: &Query) -> Query {
        Query::join(&self.defining, caller)
    }

    pub fn plan(&self, assembler: &PipelineAssembler, caller: &Query) -> Result<PipelinePlan> {
        assembler.plan(&self.source, &self.join(caller))
    }

    pub fn open(&self, assembler: &PipelineAssembler, caller: &Query) -> Result<FeatureStream> {
        let joined = self.join(caller);
        tracing::debug!(type_name = %joined.type_name, "opening view");
        assembler.open(&self.source, &joined)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use geoquery_operators::{BoxedReader, FeatureReader};

    use super::*;

    struct Table(Schema, Vec<Feature>);

    struct TableReader(Schema, std::vec::IntoIter<Feature>);

    static CLOSES: AtomicUsize = AtomicUsize::new(0);

    impl FeatureReader for TableReader {
        fn schema(&self) -> &Schema {
            &self.0
        }

        fn next_feature(&mut self) -> Result<Option<Feature>> {
            Ok(self.1.next())
        }

        fn close(&mut self) -> Result<()> {
            CLOSES.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl FeatureSource for Table {
        fn schema(&self) -> &Schema {
            &self.0
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::none()
        }

        fn open_reader(&self, _query: &Query) -> Result<BoxedReader> {
            Ok(Box::new(TableReader(self.0.clone(), self.1.clone().into_iter())))
        }
    }

    fn table() -> Table {
        let schema = Schema::builder("t")
            .attribute("kind", ValueType::String)
            .attribute("n", ValueType::Integer)
            .build()
            .unwrap();
        let features = (0..10)
            .map(|i| {
                let kind = if i % 2 == 0 { "even" } else { "odd" };
                Feature::new(format!("t.{i}"), vec![Value::from(kind), Value::Int(i)])
            })
            .collect();
        Table(schema, features)
    }

    #[test]
    fn caller_queries_are_joined_with_the_definition() {
        let view = FeatureView::new(
            table(),
            Query::new("t").with_predicate(Predicate::equals("kind", "even")),
        )
        .unwrap();
        let caller = Query::new("t")
            .with_predicate(Predicate::compare(
                ComparisonOp::Gt,
                Expression::property("n"),
                Expression::literal(3),
            ))
            .with_properties(["n"]);
        let assembler = PipelineAssembler::without_transforms();
        let out = view.open(&assembler, &caller).unwrap().collect_all().unwrap();
        let ns: Vec<Value> = out.into_iter().map(|f| f.values[0].clone()).collect();
        assert_eq!(ns, vec![Value::Int(4), Value::Int(6), Value::Int(8)]);
        assert!(CLOSES.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn defining_projection_narrows_the_schema() {
        let view = FeatureView::new(table(), Query::new("t").with_properties(["n"])).unwrap();
        assert_eq!(view.schema().names().collect::<Vec<_>>(), vec!["n"]);
        assert!(FeatureView::new(table(), Query::new("t").with_properties(["nope"])).is_err());
    }
}
