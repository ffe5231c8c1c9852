//! Primary-key generation.
//!
//! Identifiers are 24 hex characters over a 12-byte token: 4 bytes of unix
//! seconds (big-endian), 5 random bytes fixed per process, and a 3-byte
//! wrapping counter seeded randomly. Within a process later identifiers
//! always sort after earlier ones, which lets the table layer use the
//! append-optimized insert path.

use rand::RngCore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static PROCESS: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Generate a fresh identifier as bytes (the hex form, not the raw token).
pub fn generate() -> Vec<u8> {
    let process = PROCESS.get_or_init(|| {
        let mut buf = [0u8; 5];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        buf
    });
    let counter = COUNTER.get_or_init(|| AtomicU32::new(rand::rngs::OsRng.next_u32()));

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    let count = counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

    let mut token = [0u8; 12];
    token[..4].copy_from_slice(&secs.to_be_bytes());
    token[4..9].copy_from_slice(process);
    token[9..].copy_from_slice(&count.to_be_bytes()[1..]);

    hex::encode(token).into_bytes()
}
