//! Write-ahead transaction protocol.
//!
//! A [`Wal`] stages one or more `write_json` calls under a single
//! transaction id, then either `commit`s (atomically replacing every target
//! file) or `rollback`s (restoring every target to its pre-transaction
//! bytes). The log itself is the durability anchor: a transaction recorded
//! with a `commit` record is always replayed forward on recovery; one
//! without is always rolled back.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WalError;
use crate::fs::{atomic_write_bytes, ensure_dir, read_json};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record {
    Entry {
        tx_id: String,
        seq: u64,
        operation: String,
        path: String,
        backup_path: Option<String>,
        data_path: String,
        timestamp_ms: i64,
    },
    Commit {
        tx_id: String,
        timestamp_ms: i64,
    },
}

impl Record {
    fn tx_id(&self) -> &str {
        match self {
            Record::Entry { tx_id, .. } => tx_id,
            Record::Commit { tx_id, .. } => tx_id,
        }
    }
}

/// A single staged file write within a transaction.
#[derive(Debug, Clone)]
struct StagedWrite {
    /// Final target path.
    target: PathBuf,
    /// Pre-image backup, if `target` existed when staged.
    backup: Option<PathBuf>,
    /// Where the new bytes were written, pending commit.
    staged: PathBuf,
}

/// An in-flight write-ahead transaction. Every staged write is durable (the
/// staged file is fsynced and an `entry` record is appended and fsynced)
/// before `stage` returns; only `commit`/`rollback` decide whether the
/// staged bytes or the backups become the live state.
pub struct Transaction<'a> {
    wal: &'a Wal,
    tx_id: String,
    seq: AtomicU64,
    writes: Mutex<Vec<StagedWrite>>,
    finished: std::sync::atomic::AtomicBool,
}

impl<'a> Transaction<'a> {
    /// Stage a write of `value` (as pretty JSON) to `path`. Durable on
    /// return: a crash after this call either replays or rolls back this
    /// write on the next `Wal::open`.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), WalError> {
        let data = serde_json::to_vec_pretty(value)
            .map_err(|e| WalError::CorruptRecord(e.to_string()))?;
        self.write_bytes(path, &data)
    }

    /// Stage a write of raw `data` to `path`.
    pub fn write_bytes(&self, path: &Path, data: &[u8]) -> Result<(), WalError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let backup_path = if path.exists() {
            Some(
                self.wal
                    .dir
                    .join(format!("{}_{}.backup", self.tx_id, seq)),
            )
        } else {
            None
        };
        let staged_path = self
            .wal
            .dir
            .join(format!("{}_{}.staged", self.tx_id, seq));

        if let Some(backup) = &backup_path {
            let existing = std::fs::read(path)?;
            atomic_write_bytes(backup, &existing)?;
        }
        atomic_write_bytes(&staged_path, data)?;

        let record = Record::Entry {
            tx_id: self.tx_id.clone(),
            seq,
            operation: "write_json".to_string(),
            path: path.to_string_lossy().into_owned(),
            backup_path: backup_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            data_path: staged_path.to_string_lossy().into_owned(),
            timestamp_ms: now_ms(),
        };
        self.wal.append_record(&record)?;

        self.writes.lock().unwrap().push(StagedWrite {
            target: path.to_path_buf(),
            backup: backup_path,
            staged: staged_path,
        });
        debug!(tx_id = %self.tx_id, seq, path = %file_name, "wal: staged write");
        Ok(())
    }

    /// Commit: append the commit record, fsync, then copy every staged file
    /// over its target, then remove backups/staged files and this
    /// transaction's log entries.
    pub fn commit(self) -> Result<(), WalError> {
        self.finished.store(true, Ordering::SeqCst);
        let record = Record::Commit {
            tx_id: self.tx_id.clone(),
            timestamp_ms: now_ms(),
        };
        self.wal.append_record(&record)?;

        let writes = self.writes.lock().unwrap();
        for w in writes.iter() {
            let data = std::fs::read(&w.staged)?;
            atomic_write_bytes(&w.target, &data)?;
        }
        self.wal.cleanup_tx(&self.tx_id, &writes)?;
        info!(tx_id = %self.tx_id, files = writes.len(), "wal: transaction committed");
        Ok(())
    }

    /// Roll back: restore every backup over its target (reverse order),
    /// then remove backups/staged files and this transaction's log entries.
    /// No-op for writes that had no pre-image (the target is simply left
    /// absent).
    pub fn rollback(self) -> Result<(), WalError> {
        self.finished.store(true, Ordering::SeqCst);
        let writes = self.writes.lock().unwrap();
        for w in writes.iter().rev() {
            if let Some(backup) = &w.backup {
                let data = std::fs::read(backup)?;
                atomic_write_bytes(&w.target, &data)?;
            }
        }
        self.wal.cleanup_tx(&self.tx_id, &writes)?;
        warn!(tx_id = %self.tx_id, files = writes.len(), "wal: transaction rolled back");
        Ok(())
    }
}

impl<'a> Drop for Transaction<'a> {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            warn!(tx_id = %self.tx_id, "wal: transaction dropped without commit or rollback");
        }
    }
}

/// The write-ahead log for one node (or one group's share of it — callers
/// may keep one `Wal` per logical unit of crash-atomicity, or a single
/// shared one; the log itself is namespaced only by transaction id).
pub struct Wal {
    dir: PathBuf,
    log_path: PathBuf,
    append_lock: Mutex<()>,
    tx_counter: AtomicU64,
}

impl Wal {
    /// Open (or create) the WAL rooted at `dir` (conventionally
    /// `<data_dir>/wal`), running crash recovery synchronously before
    /// returning.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WalError> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        let log_path = dir.join("wal.log");
        if !log_path.exists() {
            std::fs::File::create(&log_path)?;
        }
        let wal = Wal {
            dir,
            log_path,
            append_lock: Mutex::new(()),
            tx_counter: AtomicU64::new(0),
        };
        wal.recover()?;
        Ok(wal)
    }

    /// Begin a new transaction. `tx_id` is `tx_{unix_ms}_{counter}`: the
    /// counter guarantees uniqueness within this process even at
    /// millisecond collision.
    pub fn begin(&self) -> Transaction<'_> {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let tx_id = format!("tx_{}_{}", now_ms(), n);
        Transaction {
            wal: self,
            tx_id,
            seq: AtomicU64::new(0),
            writes: Mutex::new(Vec::new()),
            finished: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Fsync the log file without staging anything — a durability barrier
    /// for callers with no pending transaction.
    pub fn checkpoint(&self) -> Result<(), WalError> {
        let _guard = self.append_lock.lock().unwrap();
        let file = std::fs::OpenOptions::new().append(true).open(&self.log_path)?;
        file.sync_all()?;
        Ok(())
    }

    fn append_record(&self, record: &Record) -> Result<(), WalError> {
        let _guard = self.append_lock.lock().unwrap();
        let line = serde_json::to_string(record)
            .map_err(|e| WalError::CorruptRecord(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new().append(true).open(&self.log_path)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Remove a transaction's backups, staged files, and log records.
    fn cleanup_tx(&self, tx_id: &str, writes: &[StagedWrite]) -> Result<(), WalError> {
        for w in writes {
            if let Some(backup) = &w.backup {
                let _ = std::fs::remove_file(backup);
            }
            let _ = std::fs::remove_file(&w.staged);
        }
        self.prune_log(|r| r.tx_id() != tx_id)
    }

    /// Rewrite the log file keeping only records for which `keep` returns
    /// true.
    fn prune_log(&self, keep: impl Fn(&Record) -> bool) -> Result<(), WalError> {
        let _guard = self.append_lock.lock().unwrap();
        let records = self.read_all_records()?;
        let kept: Vec<Record> = records.into_iter().filter(|r| keep(r)).collect();
        let mut buf = Vec::new();
        for r in &kept {
            let line = serde_json::to_string(r).map_err(|e| WalError::CorruptRecord(e.to_string()))?;
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        atomic_write_bytes(&self.log_path, &buf)
    }

    fn read_all_records(&self) -> Result<Vec<Record>, WalError> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.log_path)?;
        let mut out = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(line)
                .map_err(|e| WalError::CorruptRecord(format!("{e}: {line}")))?;
            out.push(record);
        }
        Ok(out)
    }

    /// Scan the log: transactions with a `commit` record are replayed
    /// forward (staged files copied over targets), transactions without one
    /// are rolled back (backups restored). Afterward the log is truncated
    /// and any orphan `wal/*.staged`/`*.backup` files are swept.
    fn recover(&self) -> Result<(), WalError> {
        let records = self.read_all_records()?;
        if records.is_empty() {
            return self.sweep_orphans();
        }

        let mut by_tx: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for r in records {
            by_tx.entry(r.tx_id().to_string()).or_default().push(r);
        }

        for (tx_id, recs) in &by_tx {
            let committed = recs.iter().any(|r| matches!(r, Record::Commit { .. }));
            let mut entries: Vec<&Record> = recs
                .iter()
                .filter(|r| matches!(r, Record::Entry { .. }))
                .collect();
            entries.sort_by_key(|r| match r {
                Record::Entry { seq, .. } => *seq,
                Record::Commit { .. } => u64::MAX,
            });

            if committed {
                info!(tx_id, "wal recovery: replaying committed transaction");
                for r in &entries {
                    if let Record::Entry { path, data_path, .. } = r {
                        if let Ok(data) = std::fs::read(data_path) {
                            atomic_write_bytes(Path::new(path), &data)?;
                        }
                    }
                }
            } else {
                warn!(tx_id, "wal recovery: rolling back uncommitted transaction");
                for r in entries.iter().rev() {
                    if let Record::Entry { path, backup_path, .. } = r {
                        if let Some(backup) = backup_path {
                            if let Ok(data) = std::fs::read(backup) {
                                atomic_write_bytes(Path::new(path), &data)?;
                            }
                        }
                    }
                }
            }

            for r in &entries {
                if let Record::Entry { backup_path, data_path, .. } = r {
                    if let Some(backup) = backup_path {
                        let _ = std::fs::remove_file(backup);
                    }
                    let _ = std::fs::remove_file(data_path);
                }
            }
        }

        atomic_write_bytes(&self.log_path, b"")?;
        self.sweep_orphans()
    }

    /// Remove any `.staged`/`.backup` file under `dir` not referenced by the
    /// (now-empty, post-recovery) log — leftovers from a crash between
    /// writing a staged file and appending its log record.
    fn sweep_orphans(&self) -> Result<(), WalError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Ok(()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with(".staged") || name.ends_with(".backup") {
                let _ = std::fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Read back the last committed JSON snapshot at `path`, or fall back to
    /// reading `path` directly if recovery already settled it there.
    pub fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T, WalError> {
        Ok(read_json(path)?)
    }
}
