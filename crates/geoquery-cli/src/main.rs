//! geoquery CLI: validate, explain, compile and run YAML query documents.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use geoquery_core::prelude::*;
use geoquery_io::{copy_features, JsonlReader, JsonlWriter, MemorySource};
use geoquery_operators::FeatureStream;
use geoquery_planner::{
    parse_query_document, FeatureView, PipelineAssembler, PropertyNameResolver, QueryDocument,
};
use geoquery_sql::{FidKeyMapper, PostgisDialect, SelectBuilder, SqlCompiler, SqlDialect};

#[derive(Parser)]
#[command(name = "geoquery")]
#[command(about = "Capability-aware feature queries: plan, compile to SQL, or run over JSONL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a query document parses and plans
    Validate {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Show which stages run natively and which are decorated (EXPLAIN)
    Explain {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Compile the query to a SELECT statement
    Sql {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,

        /// Emit placeholders plus a parameter list (overrides config)
        #[arg(long)]
        prepared: bool,

        /// Spatial SQL dialect
        #[arg(long, value_enum, default_value_t = Dialect::Base)]
        dialect: Dialect,

        /// Identifier escape string (overrides config)
        #[arg(long)]
        escape: Option<String>,

        /// Print the compiled statement as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute the query over a JSONL data file and write JSONL
    Run {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,

        /// JSONL input (overrides the document's `data`)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Base,
    Postgis,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { query } => validate(&query).map(|()| println!("✓ Query document is valid")),
        Commands::Explain { query } => explain(&query),
        Commands::Sql {
            query,
            prepared,
            dialect,
            escape,
            json,
        } => sql(&query, prepared, dialect, escape, json),
        Commands::Run {
            query,
            data,
            output,
        } => run(&query, data, output),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn load(path: &Path) -> CliResult<(QueryDocument, Schema)> {
    let yaml = fs::read_to_string(path)?;
    let doc = parse_query_document(&yaml)?;
    let schema = doc.schema()?;
    Ok((doc, schema))
}

/// Spherical web mercator between EPSG:4326 and EPSG:3857.
fn builtin_transforms() -> Arc<TransformRegistry> {
    const R: f64 = 6_378_137.0;
    const MAX_LAT: f64 = 85.051_128_78;
    let mut registry = TransformRegistry::new();
    registry.register_fn(Crs::epsg(4326), Crs::epsg(3857), |c| {
        if c.y.abs() > MAX_LAT {
            return Err(Error::Evaluation(format!("latitude {} outside web mercator", c.y)));
        }
        let x = R * c.x.to_radians();
        let y = R * (std::f64::consts::FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln();
        Ok(Coord::new(x, y))
    });
    registry.register_fn(Crs::epsg(3857), Crs::epsg(4326), |c| {
        let lon = (c.x / R).to_degrees();
        let lat = (2.0 * (c.y / R).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
        Ok(Coord::new(lon, lat))
    });
    Arc::new(registry)
}

fn assembler() -> PipelineAssembler {
    PipelineAssembler::new(builtin_transforms())
}

/// The caller query joined with the document's view, if any.
fn effective_query(doc: &QueryDocument) -> Query {
    match doc.view_query() {
        Some(defining) => Query::join(&defining, &doc.query()),
        None => doc.query(),
    }
}

fn validate(path: &Path) -> CliResult<()> {
    let (doc, schema) = load(path)?;
    let source = MemorySource::new(schema, Vec::new())?.with_capabilities(doc.capabilities);
    assembler().plan(&source, &effective_query(&doc))?;
    Ok(())
}

fn explain(path: &Path) -> CliResult<()> {
    let (doc, schema) = load(path)?;
    let source = MemorySource::new(schema, Vec::new())?.with_capabilities(doc.capabilities);
    let plan = assembler().plan(&source, &effective_query(&doc))?;

    println!("Query Plan");
    println!("==========");
    println!();
    println!("{plan}");
    if plan.is_fully_native() {
        println!();
        println!("(fully native: no decorators)");
    }
    Ok(())
}

fn key_mapper(doc: &QueryDocument, schema: &Schema) -> CliResult<Option<FidKeyMapper>> {
    if doc.primary_key.is_empty() {
        return Ok(None);
    }
    let mut mapper = FidKeyMapper::new(doc.type_name.clone());
    for column in &doc.primary_key {
        let value_type = schema.value_type_of(column).ok_or_else(|| {
            Error::schema(format!("primary key column '{column}' is not in the schema"))
        })?;
        mapper = mapper.column(column.clone(), value_type);
    }
    Ok(Some(mapper))
}

fn apply_sql_overrides(config: &mut QueryConfig, prepared: bool, escape: Option<String>) {
    if prepared {
        config.prepared_statements = true;
    }
    if let Some(esc) = escape {
        config.identifier_escape = esc;
    }
}

fn sql(
    path: &Path,
    prepared: bool,
    dialect: Dialect,
    escape: Option<String>,
    json: bool,
) -> CliResult<()> {
    let (doc, schema) = load(path)?;
    let mut config = doc.effective_config();
    apply_sql_overrides(&mut config, prepared, escape);

    let dialect: Arc<dyn SqlDialect> = match dialect {
        Dialect::Base => Arc::new(geoquery_sql::BaseDialect),
        Dialect::Postgis => Arc::new(PostgisDialect),
    };
    let mut compiler = SqlCompiler::new(schema.clone())
        .with_config(config)
        .with_dialect(dialect);
    if let Some(mapper) = key_mapper(&doc, &schema)? {
        compiler = compiler.with_key_mapper(Arc::new(mapper));
    }

    let query = PropertyNameResolver::default().resolve(&effective_query(&doc), &schema)?;
    let statement = SelectBuilder::new(&compiler, doc.table_name()).build(&query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statement)?);
        return Ok(());
    }
    println!("{statement}");
    for (i, value) in statement.values.iter().enumerate() {
        let ty = statement.types[i].map_or("unknown".to_string(), |t| t.to_string());
        match statement.srids[i] {
            Some(srid) => println!("  ${} = {value} ({ty}, srid {srid})", i + 1),
            None => println!("  ${} = {value} ({ty})", i + 1),
        }
    }
    Ok(())
}

/// Relative data paths are taken relative to the query document.
fn data_path(doc: &QueryDocument, query_path: &Path, flag: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(p) = flag {
        return Ok(p);
    }
    let data = doc
        .data
        .as_ref()
        .ok_or_else(|| Error::Config("no data file: set `data` or pass --data".into()))?;
    let p = PathBuf::from(data);
    if p.is_absolute() {
        return Ok(p);
    }
    Ok(query_path.parent().map_or(p.clone(), |dir| dir.join(&p)))
}

fn run(path: &Path, data: Option<PathBuf>, output: Option<PathBuf>) -> CliResult<()> {
    let (doc, schema) = load(path)?;
    let data = data_path(&doc, path, data)?;

    let input = JsonlReader::from_path(&data, schema.clone())?;
    let features = FeatureStream::new(Box::new(input)).collect_all()?;
    tracing::info!(path = %data.display(), features = features.len(), "loaded data");

    let transforms = builtin_transforms();
    let source = MemorySource::new(schema, features)?
        .with_capabilities(doc.capabilities)
        .with_transforms(transforms.clone());
    let assembler = PipelineAssembler::new(transforms);

    let stream = match doc.view_query() {
        Some(defining) => FeatureView::new(&source, defining)?.open(&assembler, &doc.query())?,
        None => assembler.open(&source, &doc.query())?,
    };

    let written = match output {
        Some(out) => {
            let mut writer = JsonlWriter::to_path(&out)?;
            copy_features(stream, &mut writer, None)?
        }
        None => {
            let stdout = io::stdout();
            let mut writer = JsonlWriter::to_writer(stdout.lock());
            let n = copy_features(stream, &mut writer, None)?;
            writer.into_inner()?.flush()?;
            n
        }
    };
    eprintln!("✓ {written} features");
    Ok(())
}
