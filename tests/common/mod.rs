use nndb::table::Table;
use nndb::{Database, Document, Options};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected a JSON object"),
    }
}

/// The shared seed records used across the scenario tests.
pub fn seed_docs() -> Vec<Document> {
    vec![
        doc(json!({"name": "Gareth Bult", "age": 21, "cat": "A", "admin": true})),
        doc(json!({"name": "Squizzey", "age": 3000, "cat": "A"})),
        doc(json!({"name": "Fred Bloggs", "age": 45, "cat": "A"})),
        doc(json!({"name": "John Doe", "age": 40, "cat": "B", "admin": true})),
        doc(json!({"name": "John Smith", "age": 40, "cat": "B"})),
        doc(json!({"name": "Jim Smith", "age": 40, "cat": "B"})),
        doc(json!({"name": "Gareth Bult1", "age": 21, "cat": "B", "admin": true})),
    ]
}

pub fn open_db() -> anyhow::Result<(tempfile::TempDir, Database)> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(dir.path(), Options::default())?;
    Ok((dir, db))
}

/// A `people` table populated with the seed records.
pub fn seeded_table(db: &Database) -> anyhow::Result<Arc<Table>> {
    let table = db.table("people")?;
    for mut doc in seed_docs() {
        table.append(&mut doc)?;
    }
    Ok(table)
}

#[allow(dead_code)]
pub fn names(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d["name"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn ages(docs: &[Document]) -> Vec<i64> {
    docs.iter().map(|d| d["age"].as_i64().unwrap_or(-1)).collect()
}
