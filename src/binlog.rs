//! Binary log of mutation batches.
//!
//! Every committed user transaction appends one batch under a big-endian
//! `u64` sequence number, starting at 1 and gapless within a process. The
//! first enable writes an empty sentinel batch at sequence 1 so consumers
//! have a defined starting point. `__binidx__` is reserved for future
//! cross-referencing and stays empty.

use crate::error::{Error, Result};
use crate::kv::{self, Cursor, Kv, PutMode, SubDb};
use lmdb::{RwTransaction, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const BINLOG_DB: &str = "__binlog__";
pub const BINIDX_DB: &str = "__binidx__";

/// One mutation descriptor, tagged by command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum LogRecord {
    #[serde(rename = "add")]
    Add { tab: String, doc: Value },
    #[serde(rename = "del")]
    Del { tab: String, keys: Vec<String> },
    #[serde(rename = "upd")]
    Upd { tab: String, key: String, diff: Value },
    #[serde(rename = "emp")]
    Emp { tab: String },
    #[serde(rename = "idx")]
    Idx {
        tab: String,
        idx: String,
        fun: String,
        dup: bool,
    },
    #[serde(rename = "uix")]
    Uix { tab: String, idx: String },
    #[serde(rename = "cre")]
    Cre { tab: String },
    #[serde(rename = "drp")]
    Drp { tab: String },
}

/// The serialized form of one committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub txn: Vec<LogRecord>,
}

#[derive(Debug, Clone, Copy)]
pub struct Binlog {
    log: SubDb,
    idx: SubDb,
}

impl Binlog {
    pub(crate) fn open<T: Transaction>(kv: &Kv, txn: &T, create: bool) -> Result<Binlog> {
        let log = kv.open_sub_db(txn, Some(BINLOG_DB), create, false)?;
        let idx = kv.open_sub_db(txn, Some(BINIDX_DB), create, false)?;
        Ok(Binlog { log, idx })
    }

    /// Write the empty starting batch at sequence 1 unless the log already
    /// has entries.
    pub(crate) fn ensure_sentinel(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        if kv::entries(&*txn, self.log)? > 0 {
            return Ok(());
        }
        let batch = serde_json::to_vec(&Batch { txn: Vec::new() })?;
        if !kv::put(txn, self.log, &1u64.to_be_bytes(), &batch, PutMode::Plain)? {
            return Err(Error::WriteFail("binlog sentinel".to_string()));
        }
        Ok(())
    }

    /// Highest recorded sequence number, 0 when the log is empty.
    pub fn last_seq<T: Transaction>(&self, txn: &T) -> Result<u64> {
        let mut cursor = Cursor::open(txn, self.log)?;
        if !cursor.last()? {
            return Ok(0);
        }
        match cursor.key() {
            Some(key) if key.len() == 8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(key);
                Ok(u64::from_be_bytes(raw))
            }
            _ => Err(Error::WriteFail("corrupt binlog sequence key".to_string())),
        }
    }

    /// Append one batch under the next sequence number.
    pub fn record(&self, txn: &mut RwTransaction<'_>, records: &[LogRecord]) -> Result<u64> {
        let seq = self.last_seq(&*txn)? + 1;
        let data = serde_json::to_vec(&Batch {
            txn: records.to_vec(),
        })?;
        if !kv::put(txn, self.log, &seq.to_be_bytes(), &data, PutMode::Append)? {
            return Err(Error::WriteFail(format!("binlog entry {seq}")));
        }
        debug!(seq, records = records.len(), "recorded binlog batch");
        Ok(seq)
    }

    /// Every `(sequence, batch)` at or after `from`, for replay consumers.
    pub fn entries<T: Transaction>(&self, txn: &T, from: u64) -> Result<Vec<(u64, Batch)>> {
        let mut out = Vec::new();
        let mut cursor = Cursor::open(txn, self.log)?;
        let mut positioned = cursor.set_range(&from.to_be_bytes())?;
        while positioned {
            let (key, value) = match (cursor.key(), cursor.value()) {
                (Some(k), Some(v)) => (k, v),
                _ => break,
            };
            if key.len() != 8 {
                return Err(Error::WriteFail("corrupt binlog sequence key".to_string()));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(key);
            out.push((u64::from_be_bytes(raw), serde_json::from_slice(value)?));
            positioned = cursor.next()?;
        }
        Ok(out)
    }

    /// Delete both reserved sub-databases. Used when logging is disabled.
    pub(crate) fn drop(&self, txn: &mut RwTransaction<'_>) -> Result<()> {
        kv::drop_db(txn, self.log)?;
        kv::drop_db(txn, self.idx)
    }
}
