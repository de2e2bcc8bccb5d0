pub mod kv;

pub use kv::FileStorage;

use crate::error::Result;
use crate::state::{Booking, LedgerState};
use serde::{Deserialize, Serialize};

/// One line of the audit journal: a booking as it stood after a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub recorded_at: u64,
    pub booking: Booking,
    /// SHA256 hex of the booking's canonical bytes
    pub digest: String,
}

impl AuditEntry {
    pub fn new(booking: Booking, recorded_at: u64) -> Result<Self> {
        let digest = booking.digest()?;
        Ok(AuditEntry {
            recorded_at,
            booking,
            digest,
        })
    }

    /// True if the stored digest still matches the booking.
    pub fn verify(&self) -> bool {
        match self.booking.digest() {
            Ok(digest) => digest == self.digest,
            Err(_) => false,
        }
    }
}

/// Storage abstraction for the append-only audit journal and ledger snapshots.
///
/// Implementations must preserve:
/// - Append-only semantics for the journal
/// - Atomic snapshot writes (crash-safe)
pub trait Storage {
    /// Append an entry to the journal (append-only, fsync before ack)
    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;

    /// Load the latest ledger snapshot with the journal length it covers
    ///
    /// Returns `None` if no snapshot exists yet.
    fn load_state(&self) -> Result<Option<(LedgerState, u64)>>;

    /// Persist the snapshot atomically (write to temp file, fsync, rename)
    fn persist_state(&mut self, state: &LedgerState, journal_len: u64) -> Result<()>;

    /// Load journal entries starting at position `from` (inclusive, 0-based)
    fn load_audit_from(&self, from: u64) -> Result<Vec<AuditEntry>>;
}
