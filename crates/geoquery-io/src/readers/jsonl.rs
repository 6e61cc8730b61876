//! Streaming NDJSON feature reader.
//!
//! One object per line: `{"id": "...", "properties": {...}}`. Properties are
//! converted against the reader's schema; missing ones read as null, unknown
//! ones are skipped. Geometries use the serde form of
//! [`Geometry`](geoquery_core::geometry::Geometry).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value as Json;

use geoquery_core::prelude::*;
use geoquery_operators::FeatureReader;

pub struct JsonlReader<R: BufRead> {
    reader: R,
    schema: Schema,
    line_no: usize,
    buf: String,
    closed: bool,
}

impl JsonlReader<BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let f = File::open(path.as_ref())
            .map_err(|e| Error::io(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self::from_reader(BufReader::new(f), schema))
    }
}

impl<R: BufRead> JsonlReader<R> {
    pub fn from_reader(reader: R, schema: Schema) -> Self {
        Self {
            reader,
            schema,
            line_no: 0,
            buf: String::new(),
            closed: false,
        }
    }

    fn parse_line(&self, line: &str) -> Result<Feature> {
        let at = |msg: String| Error::io(format!("line {}: {msg}", self.line_no));
        let obj: Json = serde_json::from_str(line).map_err(|e| at(e.to_string()))?;
        let id = match obj.get("id") {
            Some(Json::String(s)) => s.clone(),
            Some(Json::Number(n)) => format!("{}.{n}", self.schema.type_name()),
            _ => format!("{}.{}", self.schema.type_name(), self.line_no),
        };
        let props = match obj.get("properties") {
            Some(Json::Object(map)) => Some(map),
            None | Some(Json::Null) => None,
            Some(_) => return Err(at("'properties' must be an object".into())),
        };
        let mut values = Vec::with_capacity(self.schema.len());
        for attr in self.schema.attributes() {
            let raw = props.and_then(|m| m.get(&attr.name)).unwrap_or(&Json::Null);
            let value = json_to_value(raw, attr)
                .map_err(|msg| at(format!("attribute '{}': {msg}", attr.name)))?;
            values.push(value);
        }
        Ok(Feature::new(id, values))
    }
}

fn json_to_value(raw: &Json, attr: &AttributeDescriptor) -> std::result::Result<Value, String> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || format!("expected {}, found {raw}", attr.value_type);
    Ok(match attr.value_type {
        ValueType::Boolean => Value::Bool(raw.as_bool().ok_or_else(mismatch)?),
        ValueType::Integer => match raw.as_i64() {
            Some(i) => Value::Int(i),
            None => match Value::from(raw.as_str().ok_or_else(mismatch)?).coerce(ValueType::Integer) {
                v @ Value::Int(_) => v,
                _ => return Err(mismatch()),
            },
        },
        ValueType::Double => Value::Double(raw.as_f64().ok_or_else(mismatch)?),
        ValueType::String => match raw {
            Json::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        },
        ValueType::Date => match Value::from(raw.as_str().ok_or_else(mismatch)?).coerce(ValueType::Date) {
            v @ Value::Date(_) => v,
            _ => return Err(mismatch()),
        },
        ValueType::Geometry => {
            let mut g: Geometry = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
            if g.crs.is_none() {
                g.crs = attr.crs.clone();
            }
            Value::Geometry(g)
        }
    })
}

impl<R: BufRead + Send> FeatureReader for JsonlReader<R> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return self.parse_line(line).map(Some);
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn schema() -> Schema {
        Schema::builder("trees")
            .attribute("species", ValueType::String)
            .attribute("height", ValueType::Double)
            .attribute("planted", ValueType::Date)
            .geometry("at", Some(Crs::epsg(4326)))
            .build()
            .unwrap()
    }

    #[test]
    fn reads_features_and_skips_blank_lines() {
        let data = r#"{"id":"trees.1","properties":{"species":"oak","height":12.5,"planted":"1999-04-01","at":{"shape":{"point":{"x":1.0,"y":2.0}}}}}

{"properties":{"species":"elm","extra":true}}
"#;
        let mut reader = JsonlReader::from_reader(data.as_bytes(), schema());
        let first = reader.next_feature().unwrap().unwrap();
        assert_eq!(first.id.as_str(), "trees.1");
        assert_eq!(first.values[1], Value::Double(12.5));
        assert_eq!(
            first.values[2],
            Value::Date(NaiveDate::from_ymd_opt(1999, 4, 1).unwrap())
        );
        assert_eq!(
            first.values[3],
            Value::Geometry(Geometry::point(1.0, 2.0).with_crs(Crs::epsg(4326)))
        );

        let second = reader.next_feature().unwrap().unwrap();
        assert_eq!(second.id.as_str(), "trees.3");
        assert_eq!(second.values[0], Value::from("elm"));
        assert!(second.values[1].is_null());
        assert!(reader.next_feature().unwrap().is_none());
    }

    #[test]
    fn type_mismatch_reports_the_line() {
        let data = "{\"id\":\"t\",\"properties\":{\"height\":\"tall\"}}\n";
        let mut reader = JsonlReader::from_reader(data.as_bytes(), schema());
        let err = reader.next_feature().unwrap_err();
        assert!(err.to_string().contains("line 1: attribute 'height'"));
    }
}
