use crate::config::Config;
use crate::error::{Error, Result};
use crate::state::LedgerState;
use crate::storage::{AuditEntry, Storage};
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

/// File-based storage using an append-only journal and snapshots.
///
/// Files:
/// - `audit.log`: Append-only audit journal (length-prefixed bincode entries)
/// - `state.bin`: Ledger snapshot (bincode LedgerState + u64 journal length)
/// - `state.bin.tmp`: Temporary file for atomic snapshot writes
pub struct FileStorage {
    audit_log_path: PathBuf,
    state_path: PathBuf,
    state_tmp_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with paths from config
    pub fn new(config: &Config) -> Self {
        Self::with_paths(config.get_audit_log_path(), config.get_state_path())
    }

    /// Create FileStorage with custom paths (for testing)
    pub fn with_paths(audit_log_path: PathBuf, state_path: PathBuf) -> Self {
        let state_tmp_path = state_path.with_extension("bin.tmp");
        FileStorage {
            audit_log_path,
            state_path,
            state_tmp_path,
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.audit_log_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::StateError(format!("Failed to create data directory: {}", e)))?;
        }
        Ok(())
    }

    /// Load the snapshot, or an empty ledger when none exists.
    pub fn load_or_default(&self) -> Result<(LedgerState, u64)> {
        Ok(self
            .load_state()?
            .unwrap_or_else(|| (LedgerState::new(), 0)))
    }
}

impl Storage for FileStorage {
    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        self.ensure_dir()?;

        let bytes = bincode::serialize(entry)
            .map_err(|e| Error::StateError(format!("Failed to serialize audit entry: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(|e| Error::StateError(format!("Failed to open audit log for append: {}", e)))?;

        // Length prefix (u64 little-endian) + entry data
        let len = bytes.len() as u64;
        file.write_all(&len.to_le_bytes())
            .map_err(|e| Error::StateError(format!("Failed to write entry length: {}", e)))?;
        file.write_all(&bytes)
            .map_err(|e| Error::StateError(format!("Failed to write entry data: {}", e)))?;

        file.sync_all()
            .map_err(|e| Error::StateError(format!("Failed to fsync audit log: {}", e)))?;

        Ok(())
    }

    fn load_state(&self) -> Result<Option<(LedgerState, u64)>> {
        if !self.state_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.state_path)
            .map_err(|e| Error::StateError(format!("Failed to open state file: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::StateError(format!("Failed to read state file: {}", e)))?;

        // Format: [LedgerState bytes][journal_len: u64]
        if data.len() < 8 {
            return Err(Error::StateError("State file too short".to_string()));
        }

        let (state_bytes, len_bytes) = data.split_at(data.len() - 8);
        let mut len_buf = [0u8; 8];
        len_buf.copy_from_slice(len_bytes);
        let journal_len = u64::from_le_bytes(len_buf);

        let state: LedgerState = bincode::deserialize(state_bytes)
            .map_err(|e| Error::StateError(format!("Failed to deserialize state: {}", e)))?;

        Ok(Some((state, journal_len)))
    }

    fn persist_state(&mut self, state: &LedgerState, journal_len: u64) -> Result<()> {
        self.ensure_dir()?;

        let state_bytes = bincode::serialize(state)
            .map_err(|e| Error::StateError(format!("Failed to serialize state: {}", e)))?;

        let mut file = File::create(&self.state_tmp_path)
            .map_err(|e| Error::StateError(format!("Failed to create temp state file: {}", e)))?;
        file.write_all(&state_bytes)
            .map_err(|e| Error::StateError(format!("Failed to write state: {}", e)))?;
        file.write_all(&journal_len.to_le_bytes())
            .map_err(|e| Error::StateError(format!("Failed to write journal length: {}", e)))?;

        // Fsync before rename (crash safety)
        file.sync_all()
            .map_err(|e| Error::StateError(format!("Failed to fsync temp state file: {}", e)))?;
        drop(file);

        fs::rename(&self.state_tmp_path, &self.state_path)
            .map_err(|e| Error::StateError(format!("Failed to rename temp state file: {}", e)))?;

        // Fsync parent directory so the rename is persisted
        if let Some(parent) = self.state_path.parent() {
            let parent_file = File::open(parent)
                .map_err(|e| Error::StateError(format!("Failed to open parent directory: {}", e)))?;
            parent_file
                .sync_all()
                .map_err(|e| Error::StateError(format!("Failed to fsync parent directory: {}", e)))?;
        }

        Ok(())
    }

    fn load_audit_from(&self, from: u64) -> Result<Vec<AuditEntry>> {
        if !self.audit_log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.audit_log_path)
            .map_err(|e| Error::StateError(format!("Failed to open audit log: {}", e)))?;
        let mut reader = BufReader::new(file);

        let mut entries = Vec::new();
        let mut position = 0u64;

        loop {
            let mut len_buf = [0u8; 8];
            match reader.read_exact(&mut len_buf) {
                Ok(_) => {
                    let len = u64::from_le_bytes(len_buf) as usize;
                    let mut buf = vec![0u8; len];
                    reader
                        .read_exact(&mut buf)
                        .map_err(|e| Error::StateError(format!("Failed to read entry data: {}", e)))?;

                    if position >= from {
                        let entry: AuditEntry = bincode::deserialize(&buf).map_err(|e| {
                            Error::StateError(format!("Failed to deserialize audit entry: {}", e))
                        })?;
                        entries.push(entry);
                    }

                    position += 1;
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(Error::StateError(format!("Failed to read audit log: {}", e)));
                }
            }
        }

        Ok(entries)
    }
}
