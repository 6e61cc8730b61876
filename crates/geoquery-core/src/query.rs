//! Declarative feature queries and the view/caller join.

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::filter::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Property(String),
    /// Feature-id order.
    Natural,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortBy {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortBy {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            key: SortKey::Property(property.into()),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            key: SortKey::Property(property.into()),
            order: SortOrder::Descending,
        }
    }

    pub fn natural() -> Self {
        Self {
            key: SortKey::Natural,
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub type_name: String,
    #[serde(default)]
    pub predicate: Predicate,
    /// `None` selects every attribute; `Some(vec![])` selects none.
    #[serde(default)]
    pub properties: Option<Vec<String>>,
    #[serde(default)]
    pub sort: Vec<SortBy>,
    /// `None` is unbounded.
    #[serde(default)]
    pub max_features: Option<usize>,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub target_crs: Option<Crs>,
}

impl Query {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            predicate: Predicate::Include,
            properties: None,
            sort: Vec::new(),
            max_features: None,
            start_index: 0,
            target_crs: None,
        }
    }

    pub fn all(type_name: impl Into<String>) -> Self {
        Self::new(type_name)
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortBy>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_max_features(mut self, max: usize) -> Self {
        self.max_features = Some(max);
        self
    }

    pub fn with_start_index(mut self, start: usize) -> Self {
        self.start_index = start;
        self
    }

    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = Some(crs);
        self
    }

    pub fn is_sorted(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Combine a view's defining query with a caller's query.
    ///
    /// Predicates are conjoined. The caller pages inside the defining window,
    /// so the narrower window wins. Projection keeps the caller's names that
    /// the view also exposes; sort and target CRS prefer the caller.
    pub fn join(defining: &Query, caller: &Query) -> Query {
        let predicate = defining.predicate.clone().conjoin(caller.predicate.clone());

        let start_index = defining.start_index.saturating_add(caller.start_index);
        let max_features = match (defining.max_features, caller.max_features) {
            (None, None) => None,
            (Some(d), None) => Some(d.saturating_sub(caller.start_index)),
            (None, Some(c)) => Some(c),
            (Some(d), Some(c)) => Some(d.saturating_sub(caller.start_index).min(c)),
        };

        let properties = match (&defining.properties, &caller.properties) {
            (None, p) | (p, None) => p.clone(),
            (Some(d), Some(c)) => Some(c.iter().filter(|n| d.contains(*n)).cloned().collect()),
        };

        let sort = if caller.sort.is_empty() {
            defining.sort.clone()
        } else {
            caller.sort.clone()
        };

        let type_name = if defining.type_name.is_empty() {
            caller.type_name.clone()
        } else {
            defining.type_name.clone()
        };

        Query {
            type_name,
            predicate,
            properties,
            sort,
            max_features,
            start_index,
            target_crs: caller.target_crs.clone().or_else(|| defining.target_crs.clone()),
        }
    }
}
