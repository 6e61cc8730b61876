//! Query documents driven end to end over JSONL data.

use std::fs;
use std::path::PathBuf;

use geoquery_core::prelude::*;
use geoquery_io::{copy_features, JsonlReader, JsonlWriter, MemorySource};
use geoquery_operators::FeatureStream;
use geoquery_planner::{parse_query_document, FeatureView, PipelineAssembler, QueryDocument};
use geoquery_sql::{SelectBuilder, SqlCompiler};

const DOC: &str = r#"
type_name: stations
schema:
  - { name: code, type: string }
  - { name: riders, type: integer }
  - { name: opened, type: date }
  - { name: loc, type: geometry, crs: "EPSG:4326" }
capabilities: { sort: true, limit: true }
config: { identifier_escape: '"' }
view:
  filter:
    gte: { left: { property: opened }, right: "2000-01-01" }
query:
  filter:
    or:
      - gt: { left: { property: riders }, right: 1000 }
      - like: { expr: { property: code }, pattern: "N*", match_case: false }
  properties: [code, riders]
  start_index: 1
  max_features: 2
"#;

const DATA: &str = r#"{"id":"stations.1","properties":{"code":"NTH","riders":400,"opened":"2004-05-01","loc":{"shape":{"point":{"x":10.7,"y":59.9}}}}}
{"id":"stations.2","properties":{"code":"sth","riders":5000,"opened":"1999-01-01","loc":null}}
{"id":"stations.3","properties":{"code":"east","riders":2500,"opened":"2010-09-09"}}
{"id":"stations.4","properties":{"code":"nw","riders":10,"opened":"2020-02-02"}}
{"id":"stations.5","properties":{"code":"west","riders":1200,"opened":"2001-07-07"}}
"#;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("geoquery-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn load(doc: &QueryDocument) -> MemorySource {
    let schema = doc.schema().unwrap();
    let reader = JsonlReader::from_reader(DATA.as_bytes(), schema.clone());
    let features = FeatureStream::new(Box::new(reader)).collect_all().unwrap();
    MemorySource::new(schema, features)
        .unwrap()
        .with_capabilities(doc.capabilities)
}

#[test]
fn document_runs_through_its_view() {
    let doc = parse_query_document(DOC).unwrap();
    let source = load(&doc);
    let view = FeatureView::new(&source, doc.view_query().unwrap()).unwrap();
    let assembler = PipelineAssembler::without_transforms();

    let plan = view.plan(&assembler, &doc.query()).unwrap();
    assert_eq!(plan.stage_names(), vec!["filter", "offset", "limit", "retype"]);

    let got = view.open(&assembler, &doc.query()).unwrap().collect_all().unwrap();
    // Opened since 2000 and busy or starting with n: NTH, east, nw, west.
    let codes: Vec<String> = got.iter().map(|f| f.values[0].to_string()).collect();
    assert_eq!(codes, vec!["east", "nw"]);
    assert!(got.iter().all(|f| f.len() == 2));
}

#[test]
fn copy_to_file_and_read_back() {
    let doc = parse_query_document(DOC).unwrap();
    let source = load(&doc);
    let dir = temp_dir("copy");
    let out = dir.join("out.jsonl");

    let stream = PipelineAssembler::without_transforms()
        .open(&source, &Query::new("stations"))
        .unwrap();
    let mut writer = JsonlWriter::to_path(&out).unwrap();
    assert_eq!(copy_features(stream, &mut writer, Some(3)).unwrap(), 3);
    drop(writer);

    let reader = JsonlReader::from_path(&out, doc.schema().unwrap()).unwrap();
    let back = FeatureStream::new(Box::new(reader)).collect_all().unwrap();
    assert_eq!(back, source.features()[..3].to_vec());
    assert!(back[1].values[3].is_null());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn document_compiles_to_sql() {
    let doc = parse_query_document(DOC).unwrap();
    let schema = doc.schema().unwrap();
    let compiler = SqlCompiler::new(schema).with_config(doc.effective_config());
    let query = Query::join(&doc.view_query().unwrap(), &doc.query());
    let sql = SelectBuilder::new(&compiler, doc.table_name())
        .build(&query.with_sort(vec![SortBy::asc("code")]))
        .unwrap();
    assert_eq!(
        sql.sql,
        "SELECT \"code\", \"riders\" FROM \"stations\" WHERE (\"opened\" >= '2000-01-01' AND (\"riders\" > 1000 OR UPPER(\"code\") LIKE 'N%')) ORDER BY \"code\" ASC LIMIT 2 OFFSET 1"
    );
}

#[test]
fn malformed_data_is_an_io_error() {
    let doc = parse_query_document(DOC).unwrap();
    let reader = JsonlReader::from_reader(
        "{\"id\":\"s\",\"properties\":{\"riders\":\"many\"}}\n".as_bytes(),
        doc.schema().unwrap(),
    );
    let err = FeatureStream::new(Box::new(reader)).collect_all().unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn missing_data_file_is_reported() {
    let dir = temp_dir("missing");
    let schema = parse_query_document(DOC).unwrap().schema().unwrap();
    let err = JsonlReader::from_path(dir.join("nope.jsonl"), schema).err().unwrap();
    assert!(err.to_string().contains("nope.jsonl"));
    let _ = fs::remove_dir_all(&dir);
}
