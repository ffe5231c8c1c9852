//! One secondary index: a sub-database of `derived_key → primary id` entries
//! maintained alongside every table write. The key is produced by a compiled
//! template; documents the template cannot render are simply absent (partial
//! index).

use crate::document::Document;
use crate::error::{Error, Result};
use crate::kv::{self, Cursor, Kv, PutMode, SubDb};
use crate::template::KeyTemplate;
use lmdb::{RwTransaction, Transaction};
use serde::{Deserialize, Serialize};

/// Sub-database configuration persisted in the metadata catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConf {
    /// Name of the backing sub-database, `_<table>_<index>`.
    pub key: String,
    pub dupsort: bool,
    pub create: bool,
}

/// Backing sub-database name for an index.
pub fn sub_db_name(table: &str, index: &str) -> String {
    format!("_{table}_{index}")
}

#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    conf: IndexConf,
    template: KeyTemplate,
    db: SubDb,
}

impl Index {
    /// Open (or with `create`, create) the backing sub-database and compile
    /// the template. A malformed template fails here, at declaration time.
    pub(crate) fn open<T: Transaction>(
        kv: &Kv,
        txn: &T,
        name: &str,
        func: &str,
        conf: IndexConf,
        create: bool,
    ) -> Result<Index> {
        let template = KeyTemplate::parse(func)?;
        let db = kv.open_sub_db(txn, Some(&conf.key), create && conf.create, conf.dupsort)?;
        Ok(Index {
            name: name.to_string(),
            conf,
            template,
            db,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dupsort(&self) -> bool {
        self.conf.dupsort
    }

    pub fn conf(&self) -> &IndexConf {
        &self.conf
    }

    pub fn template_source(&self) -> &str {
        self.template.source()
    }

    pub(crate) fn db(&self) -> SubDb {
        self.db
    }

    /// The key this index derives for a document, if the template renders.
    pub fn key_for(&self, doc: &Document) -> Option<Vec<u8>> {
        self.template.render(doc)
    }

    /// Write the entry for a document. Returns whether an entry was written:
    /// false when the template does not render, or when the exact dupsort
    /// pair is already present.
    pub fn put(&self, txn: &mut RwTransaction<'_>, id: &[u8], doc: &Document) -> Result<bool> {
        let Some(key) = self.key_for(doc) else {
            return Ok(false);
        };
        let mode = if self.conf.dupsort {
            PutMode::NoDupData
        } else {
            PutMode::Plain
        };
        kv::put(txn, self.db, &key, id, mode)
    }

    /// Remove the entry for a document. In dupsort mode only the exact
    /// `key → id` pair goes. A document the template does not cover has no
    /// entry to remove; a covered document with no entry is index drift.
    pub fn delete(&self, txn: &mut RwTransaction<'_>, id: &[u8], doc: &Document) -> Result<()> {
        let Some(key) = self.key_for(doc) else {
            return Ok(());
        };
        if !kv::del(txn, self.db, &key, Some(id))? {
            return Err(Error::WriteFail(format!(
                "index {} has no entry for {}",
                self.name,
                String::from_utf8_lossy(id)
            )));
        }
        Ok(())
    }

    /// Move the entry for a document whose attributes changed. A no-op when
    /// the derived key is unchanged. The old pair being absent is corruption.
    pub fn save(
        &self,
        txn: &mut RwTransaction<'_>,
        id: &[u8],
        old: &Document,
        new: &Document,
    ) -> Result<()> {
        let old_key = self.key_for(old);
        let new_key = self.key_for(new);
        if old_key == new_key {
            return Ok(());
        }
        if let Some(key) = old_key {
            if !kv::del(txn, self.db, &key, Some(id))? {
                return Err(Error::ReindexMismatch(String::from_utf8_lossy(id).into()));
            }
        }
        if let Some(key) = new_key {
            let mode = if self.conf.dupsort {
                PutMode::NoDupData
            } else {
                PutMode::Plain
            };
            if !kv::put(txn, self.db, &key, id, mode)? {
                return Err(Error::WriteFail(format!(
                    "index {} refused entry for {}",
                    self.name,
                    String::from_utf8_lossy(id)
                )));
            }
        }
        Ok(())
    }

    /// First primary id under the key derived from a template document.
    pub fn get<'txn, T: Transaction>(
        &self,
        txn: &'txn T,
        doc: &Document,
    ) -> Result<Option<&'txn [u8]>> {
        match self.key_for(doc) {
            Some(key) => kv::get(txn, self.db, &key),
            None => Ok(None),
        }
    }

    /// Position a cursor on the first entry whose key equals the derived key.
    pub fn seek(&self, cursor: &mut Cursor<'_>, doc: &Document) -> Result<bool> {
        match self.key_for(doc) {
            Some(key) => cursor.set_key(&key),
            None => Ok(false),
        }
    }

    /// Position a cursor at the first entry with key >= the derived key of
    /// `lower`, or at the first entry when no bound is given.
    pub fn range_start(&self, cursor: &mut Cursor<'_>, lower: Option<&Document>) -> Result<bool> {
        match lower {
            None => cursor.first(),
            Some(doc) => match self.key_for(doc) {
                Some(key) => cursor.set_range(&key),
                None => Err(Error::NoKey),
            },
        }
    }

    /// Bytewise equality between an index key and a template document.
    pub fn matches(&self, key: &[u8], doc: &Document) -> bool {
        self.key_for(doc).as_deref() == Some(key)
    }

    pub fn count<T: Transaction>(&self, txn: &T) -> Result<usize> {
        kv::entries(txn, self.db)
    }

    /// Remove every entry but keep the sub-database.
    pub fn empty(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        kv::clear_db(txn, self.db)
    }

    /// Delete the sub-database outright. The handle is unusable afterwards.
    pub fn drop(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        kv::drop_db(txn, self.db)
    }
}
