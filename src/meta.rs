//! Index catalog persistence.
//!
//! One reserved sub-database holds a JSON `{conf, func}` record per index
//! under the key `_<table>_<index>`, the same string as the index's backing
//! sub-database name. Tables re-open their indexes from these records.

use crate::error::{Error, Result};
use crate::index::{sub_db_name, IndexConf};
use crate::kv::{self, Cursor, Kv, PutMode, SubDb};
use lmdb::{RwTransaction, Transaction};
use serde::{Deserialize, Serialize};

pub const METADATA_DB: &str = "__metadata__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub conf: IndexConf,
    pub func: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    db: SubDb,
}

impl Catalog {
    pub(crate) fn open<T: Transaction>(kv: &Kv, txn: &T, create: bool) -> Result<Catalog> {
        let db = kv.open_sub_db(txn, Some(METADATA_DB), create, false)?;
        Ok(Catalog { db })
    }

    pub fn put(
        &self,
        txn: &mut RwTransaction<'_>,
        table: &str,
        index: &str,
        meta: &IndexMeta,
    ) -> Result<()> {
        let key = sub_db_name(table, index);
        let value = serde_json::to_vec(meta)?;
        if !kv::put(txn, self.db, key.as_bytes(), &value, PutMode::Plain)? {
            return Err(Error::WriteFail(format!("metadata entry {key}")));
        }
        Ok(())
    }

    pub fn get<T: Transaction>(
        &self,
        txn: &T,
        table: &str,
        index: &str,
    ) -> Result<Option<IndexMeta>> {
        let key = sub_db_name(table, index);
        match kv::get(txn, self.db, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn remove(&self, txn: &mut RwTransaction<'_>, table: &str, index: &str) -> Result<()> {
        let key = sub_db_name(table, index);
        if !kv::del(txn, self.db, key.as_bytes(), None)? {
            return Err(Error::WriteFail(format!("metadata entry {key} is missing")));
        }
        Ok(())
    }

    /// Names of the indexes recorded for a table, by prefix scan.
    pub fn indexes<T: Transaction>(&self, txn: &T, table: &str) -> Result<Vec<String>> {
        let prefix = format!("_{table}_").into_bytes();
        let mut out = Vec::new();
        let mut cursor = Cursor::open(txn, self.db)?;
        let mut positioned = cursor.set_range(&prefix)?;
        while positioned {
            let Some(key) = cursor.key() else { break };
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(String::from_utf8_lossy(&key[prefix.len()..]).into_owned());
            positioned = cursor.next()?;
        }
        Ok(out)
    }
}
