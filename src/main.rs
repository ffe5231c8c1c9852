use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use nndb::{Database, Document, Options};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nndb")]
#[command(about = "Inspect and edit an nndb document database")]
struct Args {
    /// Database directory
    #[arg(long, default_value = "./data")]
    data: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List user tables
    Tables,
    /// List the indexes of a table with their templates
    Indexes { table: String },
    /// Infer attribute types from a sample of records
    Explain {
        table: String,
        /// Number of records to sample
        #[arg(long, default_value_t = 1000)]
        sample: usize,
    },
    /// Show the record-size distribution of a table
    Analyse { table: String },
    /// Print records, in natural or index order, optionally matching a key
    Find {
        table: String,
        /// Iterate in the order of this index
        #[arg(long)]
        index: Option<String>,
        /// Only records whose index key equals this template document (JSON)
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the unique keys of an index with their duplicate counts
    Unique { table: String, index: String },
    /// Fetch one record by id
    Get { table: String, id: String },
    /// Append a record (JSON object) and print its id
    Put { table: String, json: String },
    /// Delete a record by id
    Del { table: String, id: String },
    /// Create an index from a key template
    CreateIndex {
        table: String,
        name: String,
        template: String,
        /// Allow multiple records per key
        #[arg(long)]
        duplicates: bool,
    },
    /// Drop an index
    DropIndex { table: String, name: String },
    /// Drop a table with its indexes
    DropTable { table: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let db = Database::open(&args.data, Options::default())?;

    match args.command {
        Command::Tables => {
            for name in db.tables()? {
                println!("{name}");
            }
        }
        Command::Indexes { table } => {
            let table = db.table(&table)?;
            for name in table.index_names()? {
                let (template, duplicates) = table.index_info(&name)?;
                let dup = if duplicates { " (duplicates)" } else { "" };
                println!("{name}: {template}{dup}");
            }
        }
        Command::Explain { table, sample } => {
            let table = db.table(&table)?;
            let mut types: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();
            let mut seen = 0usize;
            for doc in table.find(None, None, sample)? {
                seen += 1;
                for (name, value) in &doc {
                    types.entry(name.clone()).or_default().insert(type_name(value));
                }
            }
            println!("sampled {seen} records");
            for (name, kinds) in types {
                let kinds: Vec<&str> = kinds.into_iter().collect();
                println!("{name}: {}", kinds.join("|"));
            }
        }
        Command::Analyse { table } => {
            let table = db.table(&table)?;
            let mut sizes: Vec<usize> = Vec::new();
            for doc in table.find(None, None, usize::MAX)? {
                sizes.push(nndb::document::encode(&doc)?.len());
            }
            if sizes.is_empty() {
                println!("empty table");
                return Ok(());
            }
            sizes.sort_unstable();
            let total: usize = sizes.iter().sum();
            println!("records: {}", sizes.len());
            println!("min: {} bytes", sizes[0]);
            println!("max: {} bytes", sizes[sizes.len() - 1]);
            println!("mean: {} bytes", total / sizes.len());
            println!("median: {} bytes", sizes[sizes.len() / 2]);
        }
        Command::Find {
            table,
            index,
            key,
            limit,
        } => {
            let table = db.table(&table)?;
            let docs = match (&index, key) {
                (Some(index), Some(key)) => {
                    let key_doc = parse_doc(&key)?;
                    table.seek(index, &key_doc)?
                }
                (None, Some(_)) => bail!("--key needs --index"),
                (_, None) => table.find(index.as_deref(), None, limit.unwrap_or(usize::MAX))?,
            };
            for doc in docs {
                println!("{}", Value::Object(doc));
            }
        }
        Command::Unique { table, index } => {
            let table = db.table(&table)?;
            for (key, count) in table.index_stats(&index)? {
                println!("{}: {count}", String::from_utf8_lossy(&key));
            }
        }
        Command::Get { table, id } => {
            let table = db.table(&table)?;
            match table.get(id.as_bytes())? {
                Some(doc) => println!("{}", Value::Object(doc)),
                None => bail!("no record with id {id}"),
            }
        }
        Command::Put { table, json } => {
            let table = db.table(&table)?;
            let mut doc = parse_doc(&json)?;
            let id = table.append(&mut doc)?;
            println!("{}", String::from_utf8_lossy(&id));
        }
        Command::Del { table, id } => {
            let table = db.table(&table)?;
            table.delete([id.as_bytes()])?;
        }
        Command::CreateIndex {
            table,
            name,
            template,
            duplicates,
        } => {
            let table = db.table(&table)?;
            table.index(&name, &template, duplicates)?;
        }
        Command::DropIndex { table, name } => {
            let table = db.table(&table)?;
            table.drop_index(&name)?;
        }
        Command::DropTable { table } => {
            db.drop(&table)?;
        }
    }
    Ok(())
}

fn parse_doc(json: &str) -> anyhow::Result<Document> {
    match serde_json::from_str(json).context("invalid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("expected a JSON object"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
