//! In-memory feature table.
//!
//! Declares a configurable capability subset and implements every declared
//! capability itself. Parts of a query the table did not declare are ignored,
//! as a real backend would, so a planner bug shows up as wrong results.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use geoquery_core::prelude::*;
use geoquery_operators::{BoxedReader, FeatureReader, FeatureSource, PredicateEvaluator};

/// Open/close counters shared between a source and its readers.
#[derive(Debug, Default, Clone)]
pub struct SourceStats {
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl SourceStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Readers opened and not yet closed.
    pub fn open_readers(&self) -> usize {
        self.opens().saturating_sub(self.closes())
    }
}

#[derive(Clone)]
pub struct MemorySource {
    schema: Schema,
    features: Arc<Vec<Feature>>,
    capabilities: Capabilities,
    transforms: Option<Arc<dyn TransformProvider>>,
    fail_at: Option<usize>,
    stats: SourceStats,
}

impl MemorySource {
    /// Every feature must carry one value per schema attribute.
    pub fn new(schema: Schema, features: Vec<Feature>) -> Result<Self> {
        if let Some(bad) = features.iter().find(|f| f.len() != schema.len()) {
            return Err(Error::schema(format!(
                "feature '{}' has {} values but '{}' declares {} attributes",
                bad.id,
                bad.len(),
                schema.type_name(),
                schema.len()
            )));
        }
        Ok(Self {
            schema,
            features: Arc::new(features),
            capabilities: Capabilities::none(),
            transforms: None,
            fail_at: None,
            stats: SourceStats::default(),
        })
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Provider used for native reprojection. Without one the table still
    /// accepts a target CRS but only relabels identical CRSs.
    pub fn with_transforms(mut self, transforms: Arc<dyn TransformProvider>) -> Self {
        self.transforms = Some(transforms);
        self
    }

    /// Make the `n`th `next_feature` call of every reader fail with `Io`.
    pub fn with_failure_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    pub fn stats(&self) -> SourceStats {
        self.stats.clone()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    fn sorted(&self, sort: &[SortBy]) -> Result<Vec<Feature>> {
        let mut keys = Vec::with_capacity(sort.len());
        for s in sort {
            let index = match &s.key {
                SortKey::Property(name) => Some(self.schema.index_of(name).ok_or_else(|| {
                    Error::schema(format!("cannot sort on unknown attribute '{name}'"))
                })?),
                SortKey::Natural => None,
            };
            keys.push((index, s.order));
        }
        let mut rows = self.features.as_ref().clone();
        rows.sort_by(|a, b| {
            for (index, order) in &keys {
                let ord = match index {
                    Some(i) => compare_values(a.get(*i), b.get(*i)),
                    None => a.id.cmp(&b.id),
                };
                let ord = match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });
        Ok(rows)
    }

    fn projection(&self, query: &Query) -> Result<(Schema, Option<Vec<usize>>)> {
        match &query.properties {
            Some(names) if self.capabilities.retype => {
                let schema = self.schema.project(names)?;
                let positions = names
                    .iter()
                    .filter_map(|n| self.schema.index_of(n))
                    .collect();
                Ok((schema, Some(positions)))
            }
            _ => Ok((self.schema.clone(), None)),
        }
    }

    fn reprojection(&self, schema: &Schema, target: &Crs) -> Result<Vec<NativeReprojection>> {
        schema.require_geometry_crs(target)?;
        let mut slots = Vec::new();
        for index in schema.geometry_indices() {
            let Some(declared) = schema.attribute(index).and_then(|a| a.crs.clone()) else {
                continue;
            };
            let transform = find_transform(self.transforms.as_deref(), &declared, target)?;
            slots.push(NativeReprojection {
                index,
                declared,
                transform,
            });
        }
        Ok(slots)
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("type_name", &self.schema.type_name())
            .field("features", &self.features.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.is_null(), b.is_null()) {
            (true, true) => CmpOrdering::Equal,
            (true, false) => CmpOrdering::Less,
            (false, true) => CmpOrdering::Greater,
            (false, false) => a.partial_cmp_value(b).unwrap_or(CmpOrdering::Equal),
        },
        _ => CmpOrdering::Equal,
    }
}

impl FeatureSource for MemorySource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn open_reader(&self, query: &Query) -> Result<BoxedReader> {
        let caps = self.capabilities;

        let evaluator = if caps.filter && !query.predicate.is_include() {
            Some(PredicateEvaluator::compile(&query.predicate, &self.schema)?)
        } else {
            None
        };
        let rows = if caps.sort && !query.sort.is_empty() {
            self.sorted(&query.sort)?
        } else {
            self.features.as_ref().clone()
        };
        let (mut schema, positions) = self.projection(query)?;
        let mut reprojection = Vec::new();
        if let (true, Some(target)) = (caps.reproject, &query.target_crs) {
            reprojection = self.reprojection(&schema, target)?;
            schema = schema.with_geometry_crs(target);
        }

        let skip = if caps.offset { query.start_index } else { 0 };
        let max = query.max_features.filter(|_| caps.limit);
        tracing::debug!(
            type_name = %self.schema.type_name(),
            filter = evaluator.is_some(),
            skip,
            max = ?max,
            "memory reader opened"
        );
        self.stats.opens.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemoryReader {
            schema,
            rows: rows.into_iter(),
            evaluator,
            skip,
            remaining: max,
            positions,
            reprojection,
            transforms: self.transforms.clone(),
            target: query.target_crs.clone(),
            reads: 0,
            fail_at: self.fail_at,
            stats: self.stats.clone(),
            closed: false,
        }))
    }
}

/// Without a provider only identical CRSs are accepted.
fn find_transform(
    provider: Option<&dyn TransformProvider>,
    from: &Crs,
    to: &Crs,
) -> Result<Arc<dyn CoordinateTransform>> {
    match provider {
        Some(provider) => provider.find_transform(from, to),
        None if from == to => Ok(Arc::new(geoquery_core::transform::IdentityTransform)),
        None => Err(Error::NoTransformAvailable {
            from: from.clone(),
            to: to.clone(),
        }),
    }
}

struct NativeReprojection {
    index: usize,
    declared: Crs,
    transform: Arc<dyn CoordinateTransform>,
}

struct MemoryReader {
    schema: Schema,
    rows: std::vec::IntoIter<Feature>,
    evaluator: Option<PredicateEvaluator>,
    skip: usize,
    remaining: Option<usize>,
    positions: Option<Vec<usize>>,
    reprojection: Vec<NativeReprojection>,
    transforms: Option<Arc<dyn TransformProvider>>,
    target: Option<Crs>,
    reads: usize,
    fail_at: Option<usize>,
    stats: SourceStats,
    closed: bool,
}

impl MemoryReader {
    fn next_match(&mut self) -> Result<Option<Feature>> {
        for feature in self.rows.by_ref() {
            match &self.evaluator {
                Some(eval) if !eval.matches(&feature)? => continue,
                _ => return Ok(Some(feature)),
            }
        }
        Ok(None)
    }

    fn shape(&self, feature: Feature) -> Result<Feature> {
        let mut feature = match &self.positions {
            Some(positions) => Feature::new(
                feature.id.clone(),
                positions
                    .iter()
                    .map(|&i| feature.values.get(i).cloned().unwrap_or(Value::Null))
                    .collect(),
            ),
            None => feature,
        };
        if let Some(target) = &self.target {
            for slot in &self.reprojection {
                let Some(Value::Geometry(g)) = feature.values.get(slot.index) else {
                    continue;
                };
                // Geometries recorded in a foreign CRS get their own transform.
                let projected = match &g.crs {
                    Some(own) if *own != slot.declared => {
                        find_transform(self.transforms.as_deref(), own, target)
                            .and_then(|t| t.transform_geometry(g, target))
                    }
                    _ => slot.transform.transform_geometry(g, target),
                }
                .map_err(|e| Error::io(format!("reprojecting feature '{}': {e}", feature.id)))?;
                feature.values[slot.index] = Value::Geometry(projected);
            }
        }
        Ok(feature)
    }
}

impl FeatureReader for MemoryReader {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.closed || self.remaining == Some(0) {
            return Ok(None);
        }
        let n = self.reads;
        self.reads += 1;
        if self.fail_at == Some(n) {
            return Err(Error::io(format!("scripted failure on read {n}")));
        }
        while self.skip > 0 {
            if self.next_match()?.is_none() {
                return Ok(None);
            }
            self.skip -= 1;
        }
        let Some(feature) = self.next_match()? else {
            return Ok(None);
        };
        if let Some(left) = self.remaining.as_mut() {
            *left -= 1;
        }
        self.shape(feature).map(Some)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
