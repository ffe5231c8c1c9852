//! Tables of schemaless documents.
//!
//! A table owns one primary sub-database (`id → JSON payload`) and a catalog
//! of secondary indexes that are co-mutated with every write: the invariant
//! after any committed operation is that each index holds exactly one entry
//! per document its template covers, and nothing else.
//!
//! Every operation comes in two entry points: a `*_in` core that runs inside
//! a caller-supplied transaction, and a convenience wrapper that opens its
//! own. Any error aborts the enclosing write transaction, restoring the
//! table and all of its indexes to the pre-call state.

use crate::document::{self, Document};
use crate::error::{Error, Result};
use crate::ident;
use crate::index::{sub_db_name, Index, IndexConf};
use crate::kv::{self, Cursor, Kv, PutMode, SubDb};
use crate::meta::{Catalog, IndexMeta};
use lmdb::{RwTransaction, Transaction};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Post-filter applied to candidate documents during iteration.
pub type Filter = Box<dyn Fn(&Document) -> bool>;

pub struct Table {
    kv: Arc<Kv>,
    catalog: Catalog,
    name: String,
    db: SubDb,
    indexes: RwLock<BTreeMap<String, Index>>,
}

impl Table {
    /// Open a table and its recorded indexes inside `txn`. With `create`,
    /// the primary sub-database is created if absent.
    pub(crate) fn open<T: Transaction>(
        kv: Arc<Kv>,
        catalog: Catalog,
        txn: &T,
        name: &str,
        create: bool,
    ) -> Result<Table> {
        let db = kv.open_sub_db(txn, Some(name), create, false)?;
        let mut indexes = BTreeMap::new();
        for index_name in catalog.indexes(txn, name)? {
            let meta = catalog
                .get(txn, name, &index_name)?
                .ok_or_else(|| Error::IndexMissing(index_name.clone()))?;
            let index = Index::open(&kv, txn, &index_name, &meta.func, meta.conf, false)?;
            indexes.insert(index_name, index);
        }
        Ok(Table {
            kv,
            catalog,
            name: name.to_string(),
            db,
            indexes: RwLock::new(indexes),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn db(&self) -> SubDb {
        self.db
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Append a document. Without `_id` a fresh monotonic identifier is
    /// assigned and the append-optimized insert path is used; a supplied
    /// `_id` is honored verbatim through a plain insert. The document gets
    /// its `_id` attribute set, and every index gains an entry where its
    /// template covers the document.
    pub fn append_in(&self, txn: &mut RwTransaction<'_>, doc: &mut Document) -> Result<Vec<u8>> {
        let (id, mode) = match doc.get(document::ID) {
            None => (ident::generate(), PutMode::Append),
            // A supplied id is an insert, not an upsert; overwriting here
            // would leave the old document's index entries behind.
            Some(value) => (document::coerce_id(value)?, PutMode::NoOverwrite),
        };
        let payload = document::encode(doc)?;
        if !kv::put(txn, self.db, &id, &payload, mode)? {
            return Err(Error::WriteFail(format!(
                "append of {} to {}",
                String::from_utf8_lossy(&id),
                self.name
            )));
        }
        document::set_id(doc, &id);
        for index in self.indexes.read().values() {
            index.put(txn, &id, doc)?;
        }
        Ok(id)
    }

    pub fn append(&self, doc: &mut Document) -> Result<Vec<u8>> {
        let mut txn = self.kv.begin_rw()?;
        let id = self.append_in(&mut txn, doc)?;
        txn.commit()?;
        Ok(id)
    }

    /// Delete documents by primary key. Each key must exist; the stored
    /// document is read back first so every index entry can be derived and
    /// removed.
    pub fn delete_in(&self, txn: &mut RwTransaction<'_>, ids: &[Vec<u8>]) -> Result<()> {
        for id in ids {
            let bytes = kv::get(&*txn, self.db, id)?
                .map(|b| b.to_vec())
                .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(id).into_owned()))?;
            if !kv::del(txn, self.db, id, None)? {
                return Err(Error::WriteFail(format!(
                    "delete of {} from {}",
                    String::from_utf8_lossy(id),
                    self.name
                )));
            }
            let doc = document::decode(&bytes)?;
            for index in self.indexes.read().values() {
                index.delete(txn, id, &doc)?;
            }
        }
        Ok(())
    }

    pub fn delete<I, K>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let ids: Vec<Vec<u8>> = keys.into_iter().map(|k| k.as_ref().to_vec()).collect();
        let mut txn = self.kv.begin_rw()?;
        self.delete_in(&mut txn, &ids)?;
        txn.commit()?;
        Ok(())
    }

    /// Delete a document by the `_id` it carries.
    pub fn delete_doc(&self, doc: &Document) -> Result<()> {
        let id = document::id_of(doc)?;
        self.delete([id])
    }

    /// Overwrite an existing document and move any index entries whose
    /// derived key changed. Returns the structural delta old → new.
    pub fn save_in(&self, txn: &mut RwTransaction<'_>, doc: &Document) -> Result<Value> {
        let id = document::id_of(doc)?;
        let old_bytes = kv::get(&*txn, self.db, &id)?
            .map(|b| b.to_vec())
            .ok_or_else(|| {
                Error::WriteFail(format!(
                    "save of {}: old record is missing",
                    String::from_utf8_lossy(&id)
                ))
            })?;
        let old = document::decode(&old_bytes)?;

        let payload = document::encode(doc)?;
        if !kv::put(txn, self.db, &id, &payload, PutMode::Plain)? {
            return Err(Error::WriteFail(format!(
                "save of {} to {}",
                String::from_utf8_lossy(&id),
                self.name
            )));
        }
        let mut new = doc.clone();
        new.remove(document::ID);
        for index in self.indexes.read().values() {
            index.save(txn, &id, &old, &new)?;
        }
        Ok(document::diff(&old, &new))
    }

    pub fn save(&self, doc: &Document) -> Result<Value> {
        let mut txn = self.kv.begin_rw()?;
        let delta = self.save_in(&mut txn, doc)?;
        txn.commit()?;
        Ok(delta)
    }

    /// Remove every document and every index entry. The table and its index
    /// definitions stay.
    pub fn empty_in(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        for index in self.indexes.read().values() {
            index.empty(txn)?;
        }
        kv::clear_db(txn, self.db)
    }

    pub fn empty(&self) -> Result<()> {
        let mut txn = self.kv.begin_rw()?;
        self.empty_in(&mut txn)?;
        txn.commit()?;
        Ok(())
    }

    /// Delete the table: every index sub-database, every metadata entry and
    /// the primary sub-database, in one transaction.
    pub(crate) fn drop_in(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        let mut indexes = self.indexes.write();
        for (name, index) in indexes.iter() {
            index.drop(txn)?;
            self.catalog.remove(txn, &self.name, name)?;
        }
        indexes.clear();
        kv::drop_db(txn, self.db)?;
        debug!(table = %self.name, "dropped table");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Index management
    // ------------------------------------------------------------------

    /// Create an index: compile the template, create the sub-database,
    /// persist the metadata entry and index every existing document, all
    /// inside one transaction.
    pub fn index_in(
        &self,
        txn: &mut RwTransaction<'_>,
        name: &str,
        func: &str,
        duplicates: bool,
    ) -> Result<()> {
        if self.indexes.read().contains_key(name) {
            return Err(Error::IndexExists(name.to_string()));
        }
        let conf = IndexConf {
            key: sub_db_name(&self.name, name),
            dupsort: duplicates,
            create: true,
        };
        let index = Index::open(&self.kv, txn, name, func, conf.clone(), true)?;
        self.catalog.put(
            txn,
            &self.name,
            name,
            &IndexMeta {
                conf,
                func: func.to_string(),
            },
        )?;
        let entries = self.reindex_one(txn, &index)?;
        debug!(table = %self.name, index = name, entries, "created index");
        self.indexes.write().insert(name.to_string(), index);
        Ok(())
    }

    pub fn index(&self, name: &str, func: &str, duplicates: bool) -> Result<()> {
        let mut txn = self.kv.begin_rw()?;
        self.index_in(&mut txn, name, func, duplicates)?;
        txn.commit()?;
        Ok(())
    }

    /// Idempotent index declaration: keep an existing index unless `force`,
    /// in which case it is dropped and rebuilt.
    pub fn ensure_in(
        &self,
        txn: &mut RwTransaction<'_>,
        name: &str,
        func: &str,
        duplicates: bool,
        force: bool,
    ) -> Result<()> {
        if self.indexes.read().contains_key(name) {
            if !force {
                return Ok(());
            }
            self.drop_index_in(txn, name)?;
        }
        self.index_in(txn, name, func, duplicates)
    }

    pub fn ensure(&self, name: &str, func: &str, duplicates: bool, force: bool) -> Result<()> {
        let mut txn = self.kv.begin_rw()?;
        self.ensure_in(&mut txn, name, func, duplicates, force)?;
        txn.commit()?;
        Ok(())
    }

    /// Drop an index sub-database and its metadata entry.
    pub fn drop_index_in(&self, txn: &mut RwTransaction<'_>, name: &str) -> Result<()> {
        {
            let indexes = self.indexes.read();
            let index = indexes
                .get(name)
                .ok_or_else(|| Error::IndexMissing(name.to_string()))?;
            index.drop(txn)?;
        }
        self.catalog.remove(txn, &self.name, name)?;
        self.indexes.write().remove(name);
        Ok(())
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        let mut txn = self.kv.begin_rw()?;
        self.drop_index_in(&mut txn, name)?;
        txn.commit()?;
        Ok(())
    }

    /// Rebuild every index from the primary records.
    pub fn reindex_in(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        let indexes: Vec<Index> = self.indexes.read().values().cloned().collect();
        for index in &indexes {
            let entries = self.reindex_one(txn, index)?;
            debug!(table = %self.name, index = index.name(), entries, "reindexed");
        }
        Ok(())
    }

    pub fn reindex(&self) -> Result<()> {
        let mut txn = self.kv.begin_rw()?;
        self.reindex_in(&mut txn)?;
        txn.commit()?;
        Ok(())
    }

    /// Empty one index and repopulate it by walking the primary records in
    /// natural order. Returns the number of entries written.
    fn reindex_one(&self, txn: &mut RwTransaction<'_>, index: &Index) -> Result<usize> {
        index.empty(txn)?;
        let mut count = 0;
        let mut last: Option<Vec<u8>> = None;
        while let Some((id, bytes)) = next_entry(&*txn, self.db, last.as_deref())? {
            let doc = document::decode(&bytes)?;
            if index.put(txn, &id, &doc)? {
                count += 1;
            }
            last = Some(id);
        }
        Ok(count)
    }

    /// Whether an index of this name is present.
    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.read().contains_key(name)
    }

    /// Index names as recorded in the metadata catalog.
    pub fn index_names_in<T: Transaction>(&self, txn: &T) -> Result<Vec<String>> {
        self.catalog.indexes(txn, &self.name)
    }

    pub fn index_names(&self) -> Result<Vec<String>> {
        let txn = self.kv.begin_ro()?;
        self.index_names_in(&txn)
    }

    /// Template source and dupsort flag of an index.
    pub fn index_info(&self, name: &str) -> Result<(String, bool)> {
        let indexes = self.indexes.read();
        let index = indexes
            .get(name)
            .ok_or_else(|| Error::IndexMissing(name.to_string()))?;
        Ok((index.template_source().to_string(), index.dupsort()))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_in<T: Transaction>(&self, txn: &T, id: &[u8]) -> Result<Option<Document>> {
        match kv::get(txn, self.db, id)? {
            Some(bytes) => {
                let mut doc = document::decode(bytes)?;
                document::set_id(&mut doc, id);
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &[u8]) -> Result<Option<Document>> {
        let txn = self.kv.begin_ro()?;
        self.get_in(&txn, id)
    }

    /// Number of documents.
    pub fn records_in<T: Transaction>(&self, txn: &T) -> Result<usize> {
        kv::entries(txn, self.db)
    }

    pub fn records(&self) -> Result<usize> {
        let txn = self.kv.begin_ro()?;
        self.records_in(&txn)
    }

    /// Number of entries in an index (partial indexes hold fewer than
    /// `records`).
    pub fn index_count(&self, name: &str) -> Result<usize> {
        let indexes = self.indexes.read();
        let index = indexes
            .get(name)
            .ok_or_else(|| Error::IndexMissing(name.to_string()))?;
        let txn = self.kv.begin_ro()?;
        index.count(&txn)
    }

    /// Lazily iterate documents: in identifier order, or in derived-key
    /// order when `index` is given. `filter` post-filters; `limit` counts
    /// yielded rows only.
    pub fn find_in<'txn, T: Transaction>(
        &self,
        txn: &'txn T,
        index: Option<&str>,
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<FindIter<'txn, T>> {
        let source = match index {
            None => self.db,
            Some(name) => {
                let indexes = self.indexes.read();
                indexes
                    .get(name)
                    .ok_or_else(|| Error::IndexMissing(name.to_string()))?
                    .db()
            }
        };
        Ok(FindIter {
            txn,
            cursor: Cursor::open(txn, source)?,
            primary: self.db,
            via_index: index.is_some(),
            filter,
            remaining: limit,
            started: false,
            done: false,
        })
    }

    pub fn find(
        &self,
        index: Option<&str>,
        filter: Option<Filter>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let txn = self.kv.begin_ro()?;
        let result = self.find_in(&txn, index, filter, limit)?.collect();
        result
    }

    /// All documents whose derived key equals the key of the template
    /// document, in id order under a dupsort index.
    pub fn seek_in<'txn, T: Transaction>(
        &self,
        txn: &'txn T,
        index: &str,
        key_doc: &Document,
    ) -> Result<SeekIter<'txn, T>> {
        let (db, dupsort) = {
            let indexes = self.indexes.read();
            let index = indexes
                .get(index)
                .ok_or_else(|| Error::IndexMissing(index.to_string()))?;
            (index.db(), index.dupsort())
        };
        let mut cursor = Cursor::open(txn, db)?;
        let positioned = match self.key_of(index, key_doc) {
            Some(key) => cursor.set_key(&key)?,
            None => false,
        };
        Ok(SeekIter {
            txn,
            cursor,
            primary: self.db,
            dupsort,
            started: false,
            done: !positioned,
        })
    }

    pub fn seek(&self, index: &str, key_doc: &Document) -> Result<Vec<Document>> {
        let txn = self.kv.begin_ro()?;
        let result = self.seek_in(&txn, index, key_doc)?.collect();
        result
    }

    /// First document matching the template document, or nothing.
    pub fn seek_one_in<T: Transaction>(
        &self,
        txn: &T,
        index: &str,
        key_doc: &Document,
    ) -> Result<Option<Document>> {
        let indexes = self.indexes.read();
        let index = indexes
            .get(index)
            .ok_or_else(|| Error::IndexMissing(index.to_string()))?;
        match index.get(txn, key_doc)? {
            Some(id) => {
                let id = id.to_vec();
                drop(indexes);
                Ok(Some(fetch(txn, self.db, &id)?))
            }
            None => Ok(None),
        }
    }

    pub fn seek_one(&self, index: &str, key_doc: &Document) -> Result<Option<Document>> {
        let txn = self.kv.begin_ro()?;
        self.seek_one_in(&txn, index, key_doc)
    }

    /// Documents whose key lies within the interval. Natural order compares
    /// primary identifiers (bounds carry `_id`); an index compares derived
    /// keys (bounds are template documents). `inclusive` selects between
    /// `[lower, upper]` and `(lower, upper)`; either bound may be absent.
    pub fn range_in<'txn, T: Transaction>(
        &self,
        txn: &'txn T,
        index: Option<&str>,
        lower: Option<&Document>,
        upper: Option<&Document>,
        inclusive: bool,
    ) -> Result<RangeIter<'txn, T>> {
        let source = match index {
            None => self.db,
            Some(name) => {
                let indexes = self.indexes.read();
                indexes
                    .get(name)
                    .ok_or_else(|| Error::IndexMissing(name.to_string()))?
                    .db()
            }
        };
        let bound = |doc: Option<&Document>| -> Result<Option<Vec<u8>>> {
            match doc {
                None => Ok(None),
                Some(doc) => match index {
                    None => Ok(Some(document::id_of(doc)?)),
                    Some(name) => self.key_of(name, doc).map(Some).ok_or(Error::NoKey),
                },
            }
        };
        let lower_key = bound(lower)?;
        let upper_key = bound(upper)?;

        Ok(RangeIter {
            txn,
            cursor: Cursor::open(txn, source)?,
            primary: self.db,
            via_index: index.is_some(),
            lower_key,
            upper_key,
            inclusive,
            started: false,
            done: false,
        })
    }

    pub fn range(
        &self,
        index: Option<&str>,
        lower: Option<&Document>,
        upper: Option<&Document>,
        inclusive: bool,
    ) -> Result<Vec<Document>> {
        let txn = self.kv.begin_ro()?;
        let result = self.range_in(&txn, index, lower, upper, inclusive)?.collect();
        result
    }

    /// Unique keys of an index with their duplicate counts, in key order.
    pub fn index_stats(&self, name: &str) -> Result<Vec<(Vec<u8>, usize)>> {
        let (db, dupsort) = {
            let indexes = self.indexes.read();
            let index = indexes
                .get(name)
                .ok_or_else(|| Error::IndexMissing(name.to_string()))?;
            (index.db(), index.dupsort())
        };
        let txn = self.kv.begin_ro()?;
        let mut cursor = Cursor::open(&txn, db)?;
        let mut out = Vec::new();
        let mut positioned = cursor.first()?;
        while positioned {
            let Some(key) = cursor.key() else { break };
            let count = if dupsort { cursor.dup_count()? } else { 1 };
            out.push((key.to_vec(), count));
            positioned = cursor.next_nodup()?;
        }
        Ok(out)
    }

    /// Derived key of a template document under a named index.
    fn key_of(&self, index: &str, doc: &Document) -> Option<Vec<u8>> {
        self.indexes.read().get(index).and_then(|i| i.key_for(doc))
    }
}

/// Fetch and decode the primary record an index entry points at. A missing
/// record is corruption.
fn fetch<'txn, T: Transaction>(txn: &'txn T, primary: SubDb, id: &[u8]) -> Result<Document> {
    let bytes = kv::get(txn, primary, id)?
        .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(id).into_owned()))?;
    let mut doc = document::decode(bytes)?;
    document::set_id(&mut doc, id);
    Ok(doc)
}

/// Next primary entry after `after` (or the first), copied out so the caller
/// can mutate within the same transaction.
pub(crate) fn next_entry<T: Transaction>(
    txn: &T,
    db: SubDb,
    after: Option<&[u8]>,
) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let mut cursor = Cursor::open(txn, db)?;
    let positioned = match after {
        None => cursor.first()?,
        Some(last) => {
            if cursor.set_range(last)? && cursor.key() == Some(last) {
                cursor.next()?
            } else {
                cursor.key().is_some()
            }
        }
    };
    if !positioned {
        return Ok(None);
    }
    match (cursor.key(), cursor.value()) {
        (Some(k), Some(v)) => Ok(Some((k.to_vec(), v.to_vec()))),
        _ => Ok(None),
    }
}

pub struct FindIter<'txn, T: Transaction> {
    txn: &'txn T,
    cursor: Cursor<'txn>,
    primary: SubDb,
    via_index: bool,
    filter: Option<Filter>,
    remaining: usize,
    started: bool,
    done: bool,
}

impl<'txn, T: Transaction> Iterator for FindIter<'txn, T> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            return None;
        }
        loop {
            let moved = if self.started {
                self.cursor.next()
            } else {
                self.started = true;
                self.cursor.first()
            };
            match moved {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            let (key, value) = match (self.cursor.key(), self.cursor.value()) {
                (Some(k), Some(v)) => (k, v),
                _ => {
                    self.done = true;
                    return None;
                }
            };
            let doc = if self.via_index {
                fetch(self.txn, self.primary, value)
            } else {
                document::decode(value).map(|mut doc| {
                    document::set_id(&mut doc, key);
                    doc
                })
            };
            let doc = match doc {
                Ok(doc) => doc,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if let Some(filter) = &self.filter {
                if !filter(&doc) {
                    continue;
                }
            }
            self.remaining -= 1;
            return Some(Ok(doc));
        }
    }
}

pub struct SeekIter<'txn, T: Transaction> {
    txn: &'txn T,
    cursor: Cursor<'txn>,
    primary: SubDb,
    dupsort: bool,
    started: bool,
    done: bool,
}

impl<'txn, T: Transaction> Iterator for SeekIter<'txn, T> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.started {
            // One entry per key unless the index allows duplicates.
            if !self.dupsort {
                self.done = true;
                return None;
            }
            match self.cursor.next_dup() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.started = true;
        let id = match self.cursor.value() {
            Some(id) => id,
            None => {
                self.done = true;
                return None;
            }
        };
        match fetch(self.txn, self.primary, id) {
            Ok(doc) => Some(Ok(doc)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub struct RangeIter<'txn, T: Transaction> {
    txn: &'txn T,
    cursor: Cursor<'txn>,
    primary: SubDb,
    via_index: bool,
    lower_key: Option<Vec<u8>>,
    upper_key: Option<Vec<u8>>,
    inclusive: bool,
    started: bool,
    done: bool,
}

impl<'txn, T: Transaction> Iterator for RangeIter<'txn, T> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let moved = if self.started {
                self.cursor.next()
            } else {
                self.started = true;
                match &self.lower_key {
                    Some(key) => self.cursor.set_range(key),
                    None => self.cursor.first(),
                }
            };
            match moved {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
            let key = match self.cursor.key() {
                Some(key) => key,
                None => {
                    self.done = true;
                    return None;
                }
            };
            if !self.inclusive {
                if let Some(lower) = &self.lower_key {
                    if key == &lower[..] {
                        continue;
                    }
                }
            }
            if let Some(upper) = &self.upper_key {
                if key > &upper[..] || (!self.inclusive && key == &upper[..]) {
                    self.done = true;
                    return None;
                }
            }
            let result = if self.via_index {
                match self.cursor.value() {
                    Some(id) => fetch(self.txn, self.primary, id),
                    None => {
                        self.done = true;
                        return None;
                    }
                }
            } else {
                match self.cursor.value() {
                    Some(bytes) => document::decode(bytes).map(|mut doc| {
                        document::set_id(&mut doc, key);
                        doc
                    }),
                    None => {
                        self.done = true;
                        return None;
                    }
                }
            };
            return Some(match result {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    self.done = true;
                    Err(e)
                }
            });
        }
    }
}
