//! Atomic filesystem helpers used by the WAL and by every crate that writes
//! JSON snapshots directly (CAS index, group chain/graph snapshots).

use std::io;
use std::path::Path;

/// Create `dir` and all missing parents.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Write `data` to `path` atomically: write to a sibling temp file, fsync
/// it, then rename over the target. A half-written file can never be
/// observed at `path`.
pub fn atomic_write_bytes(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = dir.join(format!("{}.tmp-{}", file_name.to_string_lossy(), std::process::id()));

    let result = (|| -> io::Result<()> {
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

/// Write `value` to `path` as pretty-printed, atomically-replaced JSON.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    atomic_write_bytes(path, &data)
}

/// Read and parse a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<T> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.json");
        atomic_write_json(&path, &serde_json::json!({"x": 1})).unwrap();
        let v: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(v["x"], 1);
    }

    #[test]
    fn atomic_write_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.json");
        atomic_write_json(&path, &serde_json::json!({"x": 1})).unwrap();
        atomic_write_json(&path, &serde_json::json!({"x": 2})).unwrap();
        let v: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(v["x"], 2);
    }

    #[test]
    fn ensure_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
