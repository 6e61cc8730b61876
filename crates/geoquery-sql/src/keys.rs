//! Primary-key mappings for id filters.

use geoquery_core::prelude::{Error, FeatureId, Result, Value, ValueType};

/// Maps a feature id onto the key columns of a table.
pub trait KeyMapper: Send + Sync {
    fn column_names(&self) -> Vec<String>;

    /// One value per column, in `column_names` order.
    fn key_values_for(&self, id: &FeatureId) -> Result<Vec<Value>>;
}

/// Ids of the form `<type>.<v1>.<v2>...`: the optional type prefix is
/// dropped and the rest split over the key columns. The last column takes
/// whatever remains, so it may itself contain dots.
#[derive(Debug, Clone)]
pub struct FidKeyMapper {
    type_name: String,
    columns: Vec<(String, ValueType)>,
}

impl FidKeyMapper {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.columns.push((name.into(), value_type));
        self
    }
}

impl KeyMapper for FidKeyMapper {
    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(n, _)| n.clone()).collect()
    }

    fn key_values_for(&self, id: &FeatureId) -> Result<Vec<Value>> {
        let raw = id.as_str();
        let prefix = format!("{}.", self.type_name);
        let rest = raw.strip_prefix(prefix.as_str()).unwrap_or(raw);
        let parts: Vec<&str> = rest.splitn(self.columns.len().max(1), '.').collect();
        if parts.len() != self.columns.len() {
            return Err(Error::schema(format!(
                "feature id '{raw}' does not split into {} key values",
                self.columns.len()
            )));
        }
        Ok(parts
            .into_iter()
            .zip(&self.columns)
            .map(|(part, (_, ty))| Value::from(part).coerce(*ty))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_coerces() {
        let mapper = FidKeyMapper::new("roads")
            .column("region", ValueType::String)
            .column("id", ValueType::Integer);
        assert_eq!(mapper.column_names(), vec!["region", "id"]);
        assert_eq!(
            mapper.key_values_for(&FeatureId::new("roads.north.42")).unwrap(),
            vec![Value::from("north"), Value::Int(42)]
        );
        assert!(mapper.key_values_for(&FeatureId::new("roads.42")).is_err());
    }

    #[test]
    fn last_column_keeps_dots() {
        let mapper = FidKeyMapper::new("files").column("path", ValueType::String);
        assert_eq!(
            mapper.key_values_for(&FeatureId::new("files.a.b.txt")).unwrap(),
            vec![Value::from("a.b.txt")]
        );
        assert_eq!(
            mapper.key_values_for(&FeatureId::new("7")).unwrap(),
            vec![Value::from("7")]
        );
    }
}
