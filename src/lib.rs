//! Schema-flexible document store on LMDB.
//!
//! Tables hold JSON documents keyed by time-ordered identifiers. Secondary
//! indexes derive their keys from format-string templates and are maintained
//! automatically across every insert, update and delete, inside the same
//! write transaction as the primary record. A database-level transaction
//! composes multi-table batches and records them to an optional binary log
//! for downstream replay.
//!
//! ```no_run
//! use nndb::{Database, Options};
//! use serde_json::json;
//!
//! # fn main() -> nndb::Result<()> {
//! let db = Database::open(std::path::Path::new("./data"), Options::default())?;
//! let people = db.table("people")?;
//! people.index("by_age_name", "{age:03}{name}", false)?;
//!
//! let mut doc = match json!({"name": "Squizzey", "age": 3000}) {
//!     serde_json::Value::Object(map) => map,
//!     _ => unreachable!(),
//! };
//! people.append(&mut doc)?;
//! for doc in people.find(Some("by_age_name"), None, usize::MAX)? {
//!     println!("{}", serde_json::Value::Object(doc));
//! }
//! # Ok(())
//! # }
//! ```

pub mod binlog;
pub mod database;
pub mod document;
pub mod error;
pub mod ident;
pub mod index;
pub mod kv;
pub mod meta;
pub mod table;
pub mod template;
pub mod txn;

pub use binlog::{Batch, LogRecord};
pub use database::{Database, Options};
pub use document::Document;
pub use error::{Error, Result};
pub use index::Index;
pub use kv::Config;
pub use table::{Filter, Table};
pub use template::KeyTemplate;
pub use txn::Txn;
