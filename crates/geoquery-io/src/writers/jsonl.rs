//! Streaming NDJSON feature writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value as Json};

use geoquery_core::prelude::*;

/// Writes `{"id": ..., "properties": {...}}` lines, the format
/// [`JsonlReader`](crate::readers::jsonl::JsonlReader) reads back.
pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    written: usize,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path.as_ref())
            .map_err(|e| Error::io(format!("{}: {e}", path.as_ref().display())))?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Properties are keyed by `schema`'s attribute names, positionally.
    pub fn write_feature(&mut self, schema: &Schema, feature: &Feature) -> Result<()> {
        let mut props = Map::new();
        for (attr, value) in schema.attributes().iter().zip(&feature.values) {
            props.insert(attr.name.clone(), value_to_json(value)?);
        }
        let mut obj = Map::new();
        obj.insert("id".into(), Json::String(feature.id.to_string()));
        obj.insert("properties".into(), Json::Object(props));
        serde_json::to_writer(&mut self.writer, &obj)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::io(e.error().to_string()))
    }
}

fn value_to_json(v: &Value) -> Result<Json> {
    Ok(match v {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Double(d) => Json::from(*d),
        Value::Str(s) => Json::String(s.clone()),
        Value::Date(_) => Json::String(v.to_string()),
        Value::Geometry(g) => serde_json::to_value(g)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::jsonl::JsonlReader;
    use geoquery_operators::FeatureReader;

    #[test]
    fn writes_lines_the_reader_accepts() {
        let schema = Schema::builder("wells")
            .attribute("depth", ValueType::Integer)
            .attribute("note", ValueType::String)
            .geometry("pos", Some(Crs::epsg(4326)))
            .build()
            .unwrap();
        let feature = Feature::new(
            "wells.9",
            vec![
                Value::Int(40),
                Value::Null,
                Value::Geometry(Geometry::point(3.0, 4.0).with_crs(Crs::epsg(4326))),
            ],
        );
        let mut writer = JsonlWriter::to_writer(Vec::new());
        writer.write_feature(&schema, &feature).unwrap();
        assert_eq!(writer.written(), 1);
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"id\":\"wells.9\",\"properties\":{\"depth\":40,"));

        let mut reader = JsonlReader::from_reader(text.as_bytes(), schema);
        assert_eq!(reader.next_feature().unwrap().unwrap(), feature);
    }
}
