//! Thin facade over the LMDB environment.
//!
//! The `lmdb` crate handles environment lifecycle, transaction RAII and error
//! codes. Everything it does not surface goes through `lmdb-sys` here:
//! transaction-scoped `mdb_dbi_open` (so DDL commits or aborts with the data
//! writes of the same transaction), `mdb_drop`, `mdb_stat` and raw cursor
//! positioning. No other module contains unsafe code.

use crate::error::{Error, Result};
use lmdb::{Environment, EnvironmentFlags, RoTransaction, RwTransaction, Transaction};
use lmdb_sys as ffi;
use parking_lot::Mutex;
use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::path::Path;
use std::{mem, ptr, slice};

/// Environment options, matching LMDB's knobs one for one.
#[derive(Debug, Clone)]
pub struct Config {
    pub map_size: usize,
    pub subdir: bool,
    pub metasync: bool,
    pub sync: bool,
    pub lock: bool,
    pub max_dbs: u32,
    pub writemap: bool,
    pub map_async: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            map_size: 2 * 1024 * 1024 * 1024,
            subdir: true,
            metasync: false,
            sync: true,
            lock: true,
            max_dbs: 64,
            writemap: true,
            map_async: true,
        }
    }
}

/// Handle to a named sub-database. Plain dbi slot, cheap to copy.
///
/// A handle opened inside a write transaction becomes environment-wide once
/// that transaction commits; if the transaction aborts, LMDB closes the slot
/// and the handle must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubDb {
    dbi: ffi::MDB_dbi,
}

pub struct Kv {
    env: Environment,
    // mdb_dbi_open must not run from two transactions at once.
    dbi_lock: Mutex<()>,
}

impl Kv {
    pub fn open(path: &Path, config: &Config) -> Result<Kv> {
        let mut flags = EnvironmentFlags::empty();
        if config.writemap {
            flags.insert(EnvironmentFlags::WRITE_MAP);
        }
        if config.map_async {
            flags.insert(EnvironmentFlags::MAP_ASYNC);
        }
        if !config.metasync {
            flags.insert(EnvironmentFlags::NO_META_SYNC);
        }
        if !config.sync {
            flags.insert(EnvironmentFlags::NO_SYNC);
        }
        if !config.lock {
            flags.insert(EnvironmentFlags::NO_LOCK);
        }
        if !config.subdir {
            flags.insert(EnvironmentFlags::NO_SUB_DIR);
        }

        let env = Environment::new()
            .set_flags(flags)
            .set_max_dbs(config.max_dbs)
            .set_map_size(config.map_size)
            .open(path)?;

        Ok(Kv {
            env,
            dbi_lock: Mutex::new(()),
        })
    }

    pub fn begin_ro(&self) -> Result<RoTransaction<'_>> {
        Ok(self.env.begin_ro_txn()?)
    }

    pub fn begin_rw(&self) -> Result<RwTransaction<'_>> {
        Ok(self.env.begin_rw_txn()?)
    }

    pub fn sync(&self, force: bool) -> Result<()> {
        Ok(self.env.sync(force)?)
    }

    /// Open a named sub-database (or the unnamed main database for `None`)
    /// within `txn`. With `create` the sub-database is created if absent,
    /// which requires a write transaction.
    pub fn open_sub_db<T: Transaction>(
        &self,
        txn: &T,
        name: Option<&str>,
        create: bool,
        dupsort: bool,
    ) -> Result<SubDb> {
        let cname = match name {
            Some(n) => Some(
                CString::new(n)
                    .map_err(|_| Error::WriteFail(format!("sub-database name {n:?} has NUL")))?,
            ),
            None => None,
        };
        let mut flags = 0;
        if create {
            flags |= ffi::MDB_CREATE;
        }
        if dupsort {
            flags |= ffi::MDB_DUPSORT;
        }

        let _guard = self.dbi_lock.lock();
        let mut dbi: ffi::MDB_dbi = 0;
        let name_ptr = cname.as_ref().map_or(ptr::null(), |c| c.as_ptr());
        check(unsafe { ffi::mdb_dbi_open(txn.txn(), name_ptr, flags, &mut dbi) })?;
        Ok(SubDb { dbi })
    }
}

/// How a put interacts with existing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Overwrite an existing value (the default LMDB behaviour).
    Plain,
    /// Append-optimized insert; only valid when the key sorts after every
    /// existing key. Used for server-generated monotonic identifiers.
    Append,
    /// Insert that reports an already-present key instead of overwriting.
    NoOverwrite,
    /// Dupsort insert that reports an already-present key/value pair
    /// instead of storing it twice.
    NoDupData,
}

/// Write a key/value pair. Returns false when the engine refused the write
/// without error: an append out of order, or a dupsort pair already present.
pub fn put(
    txn: &mut RwTransaction<'_>,
    db: SubDb,
    key: &[u8],
    data: &[u8],
    mode: PutMode,
) -> Result<bool> {
    let flags = match mode {
        PutMode::Plain => 0,
        PutMode::Append => ffi::MDB_APPEND,
        PutMode::NoOverwrite => ffi::MDB_NOOVERWRITE,
        PutMode::NoDupData => ffi::MDB_NODUPDATA,
    };
    let mut k = out_val(key);
    let mut v = out_val(data);
    let rc = unsafe { ffi::mdb_put(txn.txn(), db.dbi, &mut k, &mut v, flags) };
    match lmdb_err(rc) {
        None => Ok(true),
        Some(lmdb::Error::KeyExist) => Ok(false),
        Some(e) => Err(e.into()),
    }
}

/// Delete a key, or in a dupsort sub-database one exact key/value pair.
/// Returns false when there was nothing to delete.
pub fn del(
    txn: &mut RwTransaction<'_>,
    db: SubDb,
    key: &[u8],
    data: Option<&[u8]>,
) -> Result<bool> {
    let mut k = out_val(key);
    let rc = match data {
        Some(d) => {
            let mut v = out_val(d);
            unsafe { ffi::mdb_del(txn.txn(), db.dbi, &mut k, &mut v) }
        }
        None => unsafe { ffi::mdb_del(txn.txn(), db.dbi, &mut k, ptr::null_mut()) },
    };
    match lmdb_err(rc) {
        None => Ok(true),
        Some(lmdb::Error::NotFound) => Ok(false),
        Some(e) => Err(e.into()),
    }
}

pub fn get<'txn, T: Transaction>(txn: &'txn T, db: SubDb, key: &[u8]) -> Result<Option<&'txn [u8]>> {
    let mut k = out_val(key);
    let mut v = empty_val();
    let rc = unsafe { ffi::mdb_get(txn.txn(), db.dbi, &mut k, &mut v) };
    match lmdb_err(rc) {
        None => Ok(Some(unsafe { in_val(&v) })),
        Some(lmdb::Error::NotFound) => Ok(None),
        Some(e) => Err(e.into()),
    }
}

/// Remove every entry but keep the sub-database itself.
pub fn clear_db(txn: &mut RwTransaction<'_>, db: SubDb) -> Result<()> {
    check(unsafe { ffi::mdb_drop(txn.txn(), db.dbi, 0) })
}

/// Delete the sub-database, its entries and its name. The handle is dead
/// afterwards.
pub fn drop_db(txn: &mut RwTransaction<'_>, db: SubDb) -> Result<()> {
    check(unsafe { ffi::mdb_drop(txn.txn(), db.dbi, 1) })
}

/// Number of entries in a sub-database.
pub fn entries<T: Transaction>(txn: &T, db: SubDb) -> Result<usize> {
    let mut stat: ffi::MDB_stat = unsafe { mem::zeroed() };
    check(unsafe { ffi::mdb_stat(txn.txn(), db.dbi, &mut stat) })?;
    Ok(stat.ms_entries as usize)
}

/// Stateful cursor over one sub-database. Movement operations return false
/// when they run off the end, leaving the cursor unpositioned.
pub struct Cursor<'txn> {
    cur: *mut ffi::MDB_cursor,
    pos: Option<(&'txn [u8], &'txn [u8])>,
}

impl<'txn> Cursor<'txn> {
    pub fn open<T: Transaction>(txn: &'txn T, db: SubDb) -> Result<Cursor<'txn>> {
        let mut cur: *mut ffi::MDB_cursor = ptr::null_mut();
        check(unsafe { ffi::mdb_cursor_open(txn.txn(), db.dbi, &mut cur) })?;
        Ok(Cursor { cur, pos: None })
    }

    pub fn first(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_FIRST)
    }

    pub fn last(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_LAST)
    }

    pub fn next(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_NEXT)
    }

    pub fn prev(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_PREV)
    }

    /// Next duplicate of the current key. Only meaningful on dupsort
    /// sub-databases.
    pub fn next_dup(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_NEXT_DUP)
    }

    /// First entry of the next distinct key.
    pub fn next_nodup(&mut self) -> Result<bool> {
        self.step(None, ffi::MDB_NEXT_NODUP)
    }

    /// Position at an exact key; false when the key is absent.
    pub fn set_key(&mut self, key: &[u8]) -> Result<bool> {
        self.step(Some(key), ffi::MDB_SET_KEY)
    }

    /// Position at the first key >= `key`.
    pub fn set_range(&mut self, key: &[u8]) -> Result<bool> {
        self.step(Some(key), ffi::MDB_SET_RANGE)
    }

    pub fn key(&self) -> Option<&'txn [u8]> {
        self.pos.map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<&'txn [u8]> {
        self.pos.map(|(_, v)| v)
    }

    /// Number of duplicates of the current key.
    pub fn dup_count(&self) -> Result<usize> {
        let mut n: usize = 0;
        check(unsafe { ffi::mdb_cursor_count(self.cur, &mut n) })?;
        Ok(n)
    }

    fn step(&mut self, key: Option<&[u8]>, op: ffi::MDB_cursor_op) -> Result<bool> {
        let mut k = match key {
            Some(k) => out_val(k),
            None => empty_val(),
        };
        let mut v = empty_val();
        let rc = unsafe { ffi::mdb_cursor_get(self.cur, &mut k, &mut v, op) };
        match lmdb_err(rc) {
            None => {
                // Both vals point into the map, valid for the transaction.
                self.pos = Some(unsafe { (in_val(&k), in_val(&v)) });
                Ok(true)
            }
            Some(lmdb::Error::NotFound) => {
                self.pos = None;
                Ok(false)
            }
            Some(e) => Err(e.into()),
        }
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.cur) }
    }
}

fn out_val(data: &[u8]) -> ffi::MDB_val {
    ffi::MDB_val {
        mv_size: data.len(),
        mv_data: data.as_ptr() as *mut c_void,
    }
}

fn empty_val() -> ffi::MDB_val {
    ffi::MDB_val {
        mv_size: 0,
        mv_data: ptr::null_mut(),
    }
}

unsafe fn in_val<'a>(val: &ffi::MDB_val) -> &'a [u8] {
    if val.mv_size == 0 {
        &[]
    } else {
        slice::from_raw_parts(val.mv_data as *const u8, val.mv_size)
    }
}

fn lmdb_err(rc: c_int) -> Option<lmdb::Error> {
    if rc == 0 {
        None
    } else {
        Some(lmdb::Error::from_err_code(rc))
    }
}

fn check(rc: c_int) -> Result<()> {
    match lmdb_err(rc) {
        None => Ok(()),
        Some(e) => Err(Error::Kv(e)),
    }
}
