//! Pipeline assembly: open the native reader and wrap it per plan.

use std::sync::Arc;

use geoquery_core::prelude::*;
use geoquery_operators::{
    BoxedReader, FeatureSource, FeatureStream, FilterReader, LimitReader, OffsetReader,
    ReprojectReader, RetypeReader,
};

use crate::lower::{lower, PipelinePlan, Stage};
use crate::resolve::PropertyNameResolver;

/// Turns (source, query) into one composed stream whose results do not
/// depend on which capabilities the source declares.
#[derive(Clone)]
pub struct PipelineAssembler {
    transforms: Arc<dyn TransformProvider>,
    resolver: PropertyNameResolver,
}

impl PipelineAssembler {
    pub fn new(transforms: Arc<dyn TransformProvider>) -> Self {
        Self {
            transforms,
            resolver: PropertyNameResolver::default(),
        }
    }

    /// Assembler whose only transforms are identities.
    pub fn without_transforms() -> Self {
        Self::new(Arc::new(TransformRegistry::new()))
    }

    pub fn with_resolver(mut self, resolver: PropertyNameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Resolve and lower `query` without touching the backend.
    pub fn plan<S: FeatureSource + ?Sized>(&self, source: &S, query: &Query) -> Result<PipelinePlan> {
        let schema = source.schema();
        let resolved = self.resolver.resolve(query, schema)?;
        lower(&resolved, source.capabilities(), schema)
    }

    /// Plan, open the native reader, and stack the decorators.
    pub fn open<S: FeatureSource + ?Sized>(&self, source: &S, query: &Query) -> Result<FeatureStream> {
        let plan = self.plan(source, query)?;
        let native = source.open_reader(&plan.native)?;
        let reader = self.assemble(native, &plan)?;
        Ok(FeatureStream::new(reader))
    }

    /// Wrap an already opened native reader. Each decorator closes whatever
    /// it was handed when its own construction fails, so on error nothing is
    /// left open.
    pub fn assemble(&self, native: BoxedReader, plan: &PipelinePlan) -> Result<BoxedReader> {
        let mut reader = native;
        for stage in &plan.stages {
            reader = match stage {
                Stage::Filter(predicate) => Box::new(FilterReader::new(reader, predicate)?),
                Stage::Reproject(crs) => Box::new(ReprojectReader::new(
                    reader,
                    crs.clone(),
                    Arc::clone(&self.transforms),
                )?),
                Stage::Offset(n) => Box::new(OffsetReader::new(reader, *n)),
                Stage::Limit(n) => Box::new(LimitReader::new(reader, *n)),
                Stage::Retype(names) => Box::new(RetypeReader::project(reader, names)?),
            };
        }
        tracing::debug!(layers = ?reader.layers(), "pipeline assembled");
        Ok(reader)
    }
}
