//! Content-addressed object store.
//!
//! Objects live at `objects/<first 2 hex>/<next 2 hex>/<full hash>`. A
//! side-car `index.json` carries each object's metadata. Every `put` writes
//! the object file atomically (tmp + fsync + rename) and then atomically
//! rewrites the whole index. On [`CasStore::open`], a reconciliation pass
//! drops index entries for missing files and recovers (or deletes) objects
//! the index doesn't know about, so the index and the on-disk object set are
//! always mutually consistent by the time callers see the store.

#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use lbm_crypto::sha256_hex;
use lbm_types::cas::{CasMeta, CasStats, Visibility, DEFAULT_MAX_OBJECT_SIZE};
use lbm_wal::fs::{atomic_write_bytes, ensure_dir};

/// CAS operation failures.
#[derive(Debug, Error)]
pub enum CasError {
    /// Underlying filesystem failure.
    #[error("cas io error: {0}")]
    Io(#[from] std::io::Error),
    /// The index file exists but could not be parsed.
    #[error("corrupt cas index: {0}")]
    CorruptIndex(String),
    /// `put` rejected a blob exceeding the configured size cap.
    #[error("object too large: {size} bytes exceeds cap of {max} bytes")]
    TooLarge {
        /// Size of the rejected blob.
        size: u64,
        /// Configured cap.
        max: u64,
    },
    /// No object or metadata exists for the requested hash.
    #[error("object not found: {0}")]
    NotFound(String),
    /// `verify` found the stored bytes no longer hash to their name; the
    /// file has already been deleted by the time this is raised.
    #[error("integrity violation: object {0} does not match its hash name")]
    Integrity(String),
}

impl From<CasError> for lbm_types::errors::LbmError {
    fn from(e: CasError) -> Self {
        match e {
            CasError::NotFound(h) => lbm_types::errors::LbmError::NotFound(h),
            CasError::TooLarge { .. } => lbm_types::errors::LbmError::Validation(e.to_string()),
            CasError::Integrity(h) => lbm_types::errors::LbmError::Integrity(h),
            other => lbm_types::errors::LbmError::Io(other.to_string()),
        }
    }
}

/// Outcome of a single reconciliation decision during [`CasStore::open`],
/// returned for logging/observability by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// An index entry was dropped because its object file is missing.
    Stale(String),
    /// An on-disk object with no index entry was re-hashed and re-indexed.
    OrphanAdded(String),
    /// An on-disk object whose content does not match its filename was deleted.
    Corrupt(String),
}

struct Inner {
    root: PathBuf,
    objects_dir: PathBuf,
    index_path: PathBuf,
    index: BTreeMap<String, CasMeta>,
    max_object_size: u64,
}

/// A content-addressed object store guarded by a single lock, matching the
/// spec's "single re-entrant mutex" requirement: every public method takes
/// that lock once and never calls another locking method while it's held.
pub struct CasStore {
    inner: Mutex<Inner>,
}

fn object_path(objects_dir: &Path, hash: &str) -> PathBuf {
    objects_dir.join(&hash[0..2]).join(&hash[2..4]).join(hash)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl CasStore {
    /// Open (or create) a CAS rooted at `root` (conventionally
    /// `<data_dir>/cas`), running the startup reconciliation pass.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CasError> {
        Self::open_with_cap(root, DEFAULT_MAX_OBJECT_SIZE)
    }

    /// Open with a non-default maximum object size.
    pub fn open_with_cap(root: impl Into<PathBuf>, max_object_size: u64) -> Result<Self, CasError> {
        let root = root.into();
        let objects_dir = root.join("objects");
        let index_path = root.join("index.json");
        ensure_dir(&objects_dir)?;

        let index: BTreeMap<String, CasMeta> = if index_path.exists() {
            let data = std::fs::read(&index_path)?;
            serde_json::from_slice(&data).map_err(|e| CasError::CorruptIndex(e.to_string()))?
        } else {
            BTreeMap::new()
        };

        let mut inner = Inner {
            root,
            objects_dir,
            index_path,
            index,
            max_object_size,
        };
        let actions = reconcile(&mut inner)?;
        for a in &actions {
            match a {
                ReconcileAction::Stale(h) => warn!(hash = %h, "cas reconcile: dropped stale index entry"),
                ReconcileAction::OrphanAdded(h) => info!(hash = %h, "cas reconcile: recovered orphan object"),
                ReconcileAction::Corrupt(h) => warn!(hash = %h, "cas reconcile: deleted corrupt object"),
            }
        }
        write_index(&inner)?;

        Ok(CasStore {
            inner: Mutex::new(inner),
        })
    }

    /// Store `data` under its SHA-256 hash, recording `visibility`, `kind`
    /// and `group_id`. Idempotent: re-putting identical bytes returns the
    /// same hash without rewriting the object file.
    pub fn put(
        &self,
        data: &[u8],
        visibility: Visibility,
        kind: impl Into<String>,
        group_id: Option<String>,
    ) -> Result<String, CasError> {
        let mut inner = self.inner.lock();
        let size = data.len() as u64;
        if size > inner.max_object_size {
            return Err(CasError::TooLarge { size, max: inner.max_object_size });
        }
        let hash = sha256_hex(data);
        let path = object_path(&inner.objects_dir, &hash);
        if !path.exists() {
            atomic_write_bytes(&path, data)?;
        }
        let meta = CasMeta {
            visibility,
            kind: kind.into(),
            group_id,
            created_ms: now_ms(),
            size,
        };
        inner.index.insert(hash.clone(), meta);
        write_index(&inner)?;
        debug!(hash = %hash, size, "cas: put");
        Ok(hash)
    }

    /// Read the raw bytes for `hash`. Does not re-hash on the hot path —
    /// use [`CasStore::verify`] for that.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>, CasError> {
        let inner = self.inner.lock();
        if !inner.index.contains_key(hash) {
            return Err(CasError::NotFound(hash.to_string()));
        }
        let path = object_path(&inner.objects_dir, hash);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CasError::NotFound(hash.to_string())
            } else {
                CasError::Io(e)
            }
        })
    }

    /// Whether `hash` is known (index entry and backing file both present).
    pub fn has(&self, hash: &str) -> bool {
        let inner = self.inner.lock();
        inner.index.contains_key(hash) && object_path(&inner.objects_dir, hash).exists()
    }

    /// Metadata for `hash`, if known.
    pub fn meta(&self, hash: &str) -> Option<CasMeta> {
        self.inner.lock().index.get(hash).cloned()
    }

    /// Recompute the hash of the stored bytes for `hash` and confirm it
    /// still matches. Deletes the object and returns an error if not.
    pub fn verify(&self, hash: &str) -> Result<(), CasError> {
        let mut inner = self.inner.lock();
        let path = object_path(&inner.objects_dir, hash);
        let data = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CasError::NotFound(hash.to_string())
            } else {
                CasError::Io(e)
            }
        })?;
        let actual = sha256_hex(&data);
        if actual != hash {
            let _ = std::fs::remove_file(&path);
            inner.index.remove(hash);
            write_index(&inner)?;
            return Err(CasError::Integrity(hash.to_string()));
        }
        Ok(())
    }

    /// Aggregate statistics over every currently-indexed object.
    pub fn stats(&self) -> CasStats {
        let inner = self.inner.lock();
        let mut stats = CasStats::default();
        for meta in inner.index.values() {
            stats.object_count += 1;
            stats.total_size_bytes += meta.size;
            *stats.by_kind.entry(meta.kind.clone()).or_insert(0) += 1;
        }
        stats
    }

    /// List every hash visible to `viewer` (a member of `viewer_groups`, or
    /// any hash with public visibility). Used by the P2P layer's
    /// authorization check for `cas_get`.
    pub fn is_visible(&self, hash: &str, viewer_groups: &std::collections::BTreeSet<String>) -> bool {
        match self.inner.lock().index.get(hash) {
            None => false,
            Some(meta) => match &meta.visibility {
                Visibility::Public => true,
                Visibility::Group(gid) => viewer_groups.contains(gid),
            },
        }
    }
}

fn write_index(inner: &Inner) -> Result<(), CasError> {
    let data = serde_json::to_vec_pretty(&inner.index)
        .map_err(|e| CasError::CorruptIndex(e.to_string()))?;
    atomic_write_bytes(&inner.index_path, &data)?;
    Ok(())
}

/// Reconciliation: drop stale index entries, recover or delete orphan
/// objects. Runs once, synchronously, at [`CasStore::open`].
fn reconcile(inner: &mut Inner) -> Result<Vec<ReconcileAction>, CasError> {
    let mut actions = Vec::new();

    let stale: Vec<String> = inner
        .index
        .keys()
        .filter(|h| !object_path(&inner.objects_dir, h).exists())
        .cloned()
        .collect();
    for h in stale {
        inner.index.remove(&h);
        actions.push(ReconcileAction::Stale(h));
    }

    let mut on_disk: Vec<PathBuf> = Vec::new();
    walk_objects(&inner.objects_dir, &mut on_disk)?;

    for path in on_disk {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if inner.index.contains_key(name) {
            continue;
        }
        let data = std::fs::read(&path)?;
        let actual = sha256_hex(&data);
        if actual == name {
            inner.index.insert(
                name.to_string(),
                CasMeta {
                    visibility: Visibility::Public,
                    kind: "unknown".to_string(),
                    group_id: None,
                    created_ms: now_ms(),
                    size: data.len() as u64,
                },
            );
            actions.push(ReconcileAction::OrphanAdded(name.to_string()));
        } else {
            let _ = std::fs::remove_file(&path);
            actions.push(ReconcileAction::Corrupt(name.to_string()));
        }
    }

    let _ = &inner.root;
    Ok(actions)
}

fn walk_objects(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CasError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_objects(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        let hash = cas.put(b"hello world", Visibility::Public, "claim", None).unwrap();
        assert_eq!(hash, sha256_hex(b"hello world"));
        assert_eq!(cas.get(&hash).unwrap(), b"hello world");
        assert!(cas.has(&hash));
    }

    #[test]
    fn rejects_oversize_blobs() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open_with_cap(dir.path(), 4).unwrap();
        let err = cas.put(b"too big", Visibility::Public, "claim", None).unwrap_err();
        assert!(matches!(err, CasError::TooLarge { .. }));
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        assert!(matches!(cas.get("deadbeef"), Err(CasError::NotFound(_))));
    }

    #[test]
    fn verify_detects_corruption() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        let hash = cas.put(b"content", Visibility::Public, "claim", None).unwrap();
        let path = object_path(&dir.path().join("objects"), &hash);
        std::fs::write(&path, b"tampered").unwrap();
        assert!(matches!(cas.verify(&hash), Err(CasError::Integrity(_))));
        assert!(!cas.has(&hash));
    }

    #[test]
    fn reconcile_drops_stale_index_entry() {
        let dir = tempdir().unwrap();
        {
            let cas = CasStore::open(dir.path()).unwrap();
            let hash = cas.put(b"stale", Visibility::Public, "claim", None).unwrap();
            let path = object_path(&dir.path().join("objects"), &hash);
            std::fs::remove_file(&path).unwrap();
        }
        let cas = CasStore::open(dir.path()).unwrap();
        assert_eq!(cas.stats().object_count, 0);
    }

    #[test]
    fn reconcile_recovers_orphan_object() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        drop(cas);

        let data = b"orphan content";
        let hash = sha256_hex(data);
        let path = object_path(&dir.path().join("objects"), &hash);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, data).unwrap();
        std::fs::write(dir.path().join("index.json"), b"{}").unwrap();

        let cas = CasStore::open(dir.path()).unwrap();
        assert!(cas.has(&hash));
        assert_eq!(cas.meta(&hash).unwrap().kind, "unknown");
    }

    #[test]
    fn reconcile_deletes_corrupt_orphan() {
        let dir = tempdir().unwrap();
        let objects = dir.path().join("objects").join("de").join("ad");
        std::fs::create_dir_all(&objects).unwrap();
        let fake_hash = "deadbeef00000000000000000000000000000000000000000000000000000000";
        std::fs::write(objects.join(fake_hash), b"not matching").unwrap();
        std::fs::write(dir.path().join("index.json"), b"{}").unwrap();

        let cas = CasStore::open(dir.path()).unwrap();
        assert!(!cas.has(fake_hash));
    }

    #[test]
    fn stats_group_by_kind() {
        let dir = tempdir().unwrap();
        let cas = CasStore::open(dir.path()).unwrap();
        cas.put(b"a", Visibility::Public, "claim", None).unwrap();
        cas.put(b"b", Visibility::Public, "claim", None).unwrap();
        cas.put(b"c", Visibility::Public, "package", None).unwrap();
        let stats = cas.stats();
        assert_eq!(stats.object_count, 3);
        assert_eq!(stats.by_kind["claim"], 2);
        assert_eq!(stats.by_kind["package"], 1);
    }
}
