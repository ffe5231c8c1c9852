use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Kv(#[from] lmdb::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table does not exist: {0}")]
    TableMissing(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Index does not exist: {0}")]
    IndexMissing(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Record has no _id attribute")]
    NoKey,

    /// An index entry referenced a primary record that is gone. Corruption.
    #[error("Record not found for key: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    WriteFail(String),

    /// The pre-update index entry was absent during a save. Corruption.
    #[error("Index entry missing during reindex of key: {0}")]
    ReindexMismatch(String),

    #[error("Bad key template: {0}")]
    BadTemplate(String),

    #[error("_id is not coercible to bytes: {0}")]
    BadId(String),

    #[error("Name uses a reserved prefix: {0}")]
    ReservedName(String),
}
