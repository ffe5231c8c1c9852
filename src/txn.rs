//! User-facing write transactions.
//!
//! A `Txn` scopes one KV write transaction and records a descriptor for each
//! mutating call made through it. On commit, a non-empty descriptor list is
//! appended to the binary log (when enabled, and unless this transaction
//! replays a remote batch) before the KV transaction commits; a transaction
//! that recorded nothing rolls back as a no-op. Dropping an uncommitted
//! `Txn` aborts it and invalidates the table cache, because sub-databases
//! created inside the aborted transaction are closed by the engine.

use crate::binlog::LogRecord;
use crate::database::Database;
use crate::document::{self, Document};
use crate::error::Result;
use crate::table::Table;
use lmdb::{RwTransaction, Transaction as _};
use serde_json::Value;
use std::sync::Arc;

pub struct Txn<'db> {
    db: &'db Database,
    inner: Option<RwTransaction<'db>>,
    records: Vec<LogRecord>,
    replicated: bool,
    finished: bool,
}

impl<'db> Txn<'db> {
    pub(crate) fn new(db: &'db Database, replicated: bool) -> Result<Txn<'db>> {
        Ok(Txn {
            inner: Some(db.kv().begin_rw()?),
            db,
            records: Vec::new(),
            replicated,
            finished: false,
        })
    }

    fn txn_mut(&mut self) -> &mut RwTransaction<'db> {
        self.inner.as_mut().expect("transaction already finished")
    }

    pub fn append(&mut self, table: &Table, doc: &mut Document) -> Result<Vec<u8>> {
        let id = table.append_in(self.txn_mut(), doc)?;
        self.records.push(LogRecord::Add {
            tab: table.name().to_string(),
            doc: Value::Object(doc.clone()),
        });
        Ok(id)
    }

    pub fn delete(&mut self, table: &Table, ids: &[Vec<u8>]) -> Result<()> {
        table.delete_in(self.txn_mut(), ids)?;
        self.records.push(LogRecord::Del {
            tab: table.name().to_string(),
            keys: ids
                .iter()
                .map(|id| String::from_utf8_lossy(id).into_owned())
                .collect(),
        });
        Ok(())
    }

    pub fn save(&mut self, table: &Table, doc: &Document) -> Result<Value> {
        let delta = table.save_in(self.txn_mut(), doc)?;
        self.records.push(LogRecord::Upd {
            tab: table.name().to_string(),
            key: String::from_utf8_lossy(&document::id_of(doc)?).into_owned(),
            diff: delta.clone(),
        });
        Ok(delta)
    }

    pub fn empty_table(&mut self, table: &Table) -> Result<()> {
        table.empty_in(self.txn_mut())?;
        self.records.push(LogRecord::Emp {
            tab: table.name().to_string(),
        });
        Ok(())
    }

    pub fn create_index(
        &mut self,
        table: &Table,
        name: &str,
        func: &str,
        duplicates: bool,
    ) -> Result<()> {
        table.index_in(self.txn_mut(), name, func, duplicates)?;
        self.records.push(LogRecord::Idx {
            tab: table.name().to_string(),
            idx: name.to_string(),
            fun: func.to_string(),
            dup: duplicates,
        });
        Ok(())
    }

    pub fn drop_index(&mut self, table: &Table, name: &str) -> Result<()> {
        table.drop_index_in(self.txn_mut(), name)?;
        self.records.push(LogRecord::Uix {
            tab: table.name().to_string(),
            idx: name.to_string(),
        });
        Ok(())
    }

    pub fn create_table(&mut self, name: &str) -> Result<Arc<Table>> {
        let txn = self.inner.as_ref().expect("transaction already finished");
        let table = self.db.table_in(txn, name)?;
        self.records.push(LogRecord::Cre {
            tab: name.to_string(),
        });
        Ok(table)
    }

    pub fn drop_table(&mut self, table: &Table) -> Result<()> {
        table.drop_in(self.txn_mut())?;
        self.db.forget(table.name());
        self.records.push(LogRecord::Drp {
            tab: table.name().to_string(),
        });
        Ok(())
    }

    /// Descriptors recorded so far.
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Publish and commit. An empty transaction aborts instead: there is
    /// nothing to make visible and nothing to log.
    pub fn commit(mut self) -> Result<()> {
        let mut txn = self.inner.take().expect("transaction already finished");
        if self.records.is_empty() {
            txn.abort();
            self.finished = true;
            return Ok(());
        }
        if !self.replicated {
            self.db.record_binlog(&mut txn, &self.records)?;
        }
        txn.commit()?;
        self.finished = true;
        Ok(())
    }

    /// Explicit rollback. Dropping the transaction does the same.
    pub fn abort(mut self) {
        if let Some(txn) = self.inner.take() {
            txn.abort();
        }
        self.db.invalidate_tables();
        self.finished = true;
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(txn) = self.inner.take() {
            txn.abort();
        }
        // Handles opened by this transaction died with it.
        self.db.invalidate_tables();
    }
}
