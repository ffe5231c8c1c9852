//! Top-level façade: one LMDB environment holding user tables, the index
//! metadata catalog and the binary log.

use crate::binlog::{Batch, Binlog};
use crate::document;
use crate::error::{Error, Result};
use crate::kv::{self, Config, Cursor, Kv};
use crate::meta::Catalog;
use crate::table::{next_entry, Table};
use crate::txn::Txn;
use lmdb::{RwTransaction, Transaction};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Open options: the raw environment config, a map-size override and the
/// binary-log toggle.
#[derive(Debug, Clone)]
pub struct Options {
    pub env: Config,
    pub size: Option<usize>,
    pub binlog: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            env: Config::default(),
            size: None,
            binlog: true,
        }
    }
}

pub struct Database {
    kv: Arc<Kv>,
    main: kv::SubDb,
    catalog: Catalog,
    binlog: Mutex<Option<Binlog>>,
    tables: Mutex<HashMap<String, Arc<Table>>>,
}

impl Database {
    pub fn open(path: &Path, options: Options) -> Result<Database> {
        let mut config = options.env.clone();
        if let Some(size) = options.size {
            config.map_size = size;
        }
        if config.subdir {
            fs::create_dir_all(path)?;
        }
        let kv = Arc::new(Kv::open(path, &config)?);

        let mut txn = kv.begin_rw()?;
        let main = kv.open_sub_db(&txn, None, false, false)?;
        let catalog = Catalog::open(&kv, &txn, true)?;
        let binlog = if options.binlog {
            let binlog = Binlog::open(&kv, &txn, true)?;
            binlog.ensure_sentinel(&mut txn)?;
            Some(binlog)
        } else {
            None
        };
        txn.commit()?;

        debug!(path = %path.display(), binlog = options.binlog, "opened database");
        Ok(Database {
            kv,
            main,
            catalog,
            binlog: Mutex::new(binlog),
            tables: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn kv(&self) -> &Kv {
        &self.kv
    }

    /// Begin a scoped write transaction.
    pub fn begin(&self) -> Result<Txn<'_>> {
        Txn::new(self, false)
    }

    /// Begin a write transaction that replays a remote batch: its mutations
    /// are not recorded to the local binary log again.
    pub fn begin_replay(&self) -> Result<Txn<'_>> {
        Txn::new(self, true)
    }

    /// A handle to a table, created lazily on first reference. Names with
    /// the reserved `_` / `~` prefixes are refused.
    ///
    /// Creating a table opens a short write transaction, so a brand-new
    /// table must not be first referenced here while a `Txn` is open on the
    /// same environment; use [`Txn::create_table`] inside transactions.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        check_name(name)?;
        self.table_unchecked(name)
    }

    fn table_unchecked(&self, name: &str) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.lock().get(name) {
            return Ok(Arc::clone(table));
        }
        let table = if self.exists_raw(name)? {
            // Existing table: a read transaction is enough to open handles,
            // but it must commit so they outlive it.
            let txn = self.kv.begin_ro()?;
            let table = Table::open(Arc::clone(&self.kv), self.catalog, &txn, name, false)?;
            txn.commit()?;
            table
        } else {
            let txn = self.kv.begin_rw()?;
            let table = Table::open(Arc::clone(&self.kv), self.catalog, &txn, name, true)?;
            txn.commit()?;
            table
        };
        let table = Arc::new(table);
        self.tables
            .lock()
            .insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// Open (creating if needed) a table inside a caller transaction. Used
    /// by `Txn::create_table` so the DDL commits or aborts with the rest of
    /// the batch.
    pub(crate) fn table_in<T: Transaction>(&self, txn: &T, name: &str) -> Result<Arc<Table>> {
        check_name(name)?;
        if let Some(table) = self.tables.lock().get(name) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Table::open(
            Arc::clone(&self.kv),
            self.catalog,
            txn,
            name,
            true,
        )?);
        self.tables
            .lock()
            .insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    /// User table names, in sorted order.
    pub fn tables(&self) -> Result<Vec<String>> {
        Ok(self
            .list_sub_dbs()?
            .into_iter()
            .filter(|name| !name.starts_with('_') && !name.starts_with('~'))
            .collect())
    }

    /// Every sub-database name, system and scratch tables included.
    pub fn tables_all(&self) -> Result<Vec<String>> {
        self.list_sub_dbs()
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables_all()?.iter().any(|n| n == name))
    }

    fn exists_raw(&self, name: &str) -> Result<bool> {
        let txn = self.kv.begin_ro()?;
        Ok(kv::get(&txn, self.main, name.as_bytes())?.is_some())
    }

    fn list_sub_dbs(&self) -> Result<Vec<String>> {
        let txn = self.kv.begin_ro()?;
        let mut cursor = Cursor::open(&txn, self.main)?;
        let mut out = Vec::new();
        let mut positioned = cursor.first()?;
        while positioned {
            if let Some(key) = cursor.key() {
                out.push(String::from_utf8_lossy(key).into_owned());
            }
            positioned = cursor.next()?;
        }
        Ok(out)
    }

    /// Drop a table: its primary sub-database, every index sub-database and
    /// every metadata entry, in one transaction.
    pub fn drop(&self, name: &str) -> Result<()> {
        if !self.exists_raw(name)? {
            return Err(Error::TableMissing(name.to_string()));
        }
        let table = self.table_unchecked(name)?;
        let mut txn = self.kv.begin_rw()?;
        table.drop_in(&mut txn)?;
        txn.commit()?;
        self.forget(name);
        Ok(())
    }

    /// Rebuild a table in place: copy into a scratch `~name` table with
    /// fresh identifiers, empty the original, copy back, drop the scratch.
    /// Index configurations survive; identifiers do not.
    pub fn restructure(&self, name: &str) -> Result<()> {
        check_name(name)?;
        if !self.exists_raw(name)? {
            return Err(Error::TableMissing(name.to_string()));
        }
        let scratch_name = format!("~{name}");
        if self.exists_raw(&scratch_name)? {
            return Err(Error::TableExists(scratch_name));
        }
        let source = self.table_unchecked(name)?;

        let mut txn = self.kv.begin_rw()?;
        let scratch = Table::open(
            Arc::clone(&self.kv),
            self.catalog,
            &txn,
            &scratch_name,
            true,
        )?;
        copy_documents(&mut txn, &source, &scratch)?;
        source.empty_in(&mut txn)?;
        copy_documents(&mut txn, &scratch, &source)?;
        scratch.drop_in(&mut txn)?;
        txn.commit()?;
        self.forget(&scratch_name);
        debug!(table = name, "restructured");
        Ok(())
    }

    /// Enable or disable binary logging. Disabling deletes the whole log.
    pub fn set_binlog(&self, enable: bool) -> Result<()> {
        let mut guard = self.binlog.lock();
        if enable {
            if guard.is_none() {
                let mut txn = self.kv.begin_rw()?;
                let binlog = Binlog::open(&self.kv, &txn, true)?;
                binlog.ensure_sentinel(&mut txn)?;
                txn.commit()?;
                *guard = Some(binlog);
            }
        } else if let Some(binlog) = guard.take() {
            let mut txn = self.kv.begin_rw()?;
            binlog.drop(&mut txn)?;
            txn.commit()?;
        }
        Ok(())
    }

    pub fn binlog_enabled(&self) -> bool {
        self.binlog.lock().is_some()
    }

    /// Highest binlog sequence number, 0 with logging disabled or empty.
    pub fn binlog_seq(&self) -> Result<u64> {
        match *self.binlog.lock() {
            Some(binlog) => {
                let txn = self.kv.begin_ro()?;
                binlog.last_seq(&txn)
            }
            None => Ok(0),
        }
    }

    /// Batches at or after `from`, for replication consumers.
    pub fn binlog_entries(&self, from: u64) -> Result<Vec<(u64, Batch)>> {
        match *self.binlog.lock() {
            Some(binlog) => {
                let txn = self.kv.begin_ro()?;
                binlog.entries(&txn, from)
            }
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn record_binlog(
        &self,
        txn: &mut RwTransaction<'_>,
        records: &[crate::binlog::LogRecord],
    ) -> Result<()> {
        if let Some(binlog) = *self.binlog.lock() {
            binlog.record(txn, records)?;
        }
        Ok(())
    }

    /// Flush the environment to disk.
    pub fn sync(&self, force: bool) -> Result<()> {
        self.kv.sync(force)
    }

    pub(crate) fn forget(&self, name: &str) {
        self.tables.lock().remove(name);
    }

    /// Drop every cached table handle. Called after an aborted transaction,
    /// which closes any sub-database handle that transaction created.
    pub(crate) fn invalidate_tables(&self) {
        self.tables.lock().clear();
    }
}

/// Copy every document from one table into another with fresh identifiers,
/// within the caller's transaction.
fn copy_documents(txn: &mut RwTransaction<'_>, from: &Table, to: &Table) -> Result<()> {
    let mut last: Option<Vec<u8>> = None;
    while let Some((id, bytes)) = next_entry(&*txn, from.db(), last.as_deref())? {
        let mut doc = document::decode(&bytes)?;
        to.append_in(txn, &mut doc)?;
        last = Some(id);
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('_')
        || name.starts_with('~')
        || name.contains('\0')
    {
        return Err(Error::ReservedName(name.to_string()));
    }
    Ok(())
}
