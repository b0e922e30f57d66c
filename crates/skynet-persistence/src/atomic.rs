use std::path::Path;

use crate::error::Result;

/// Serialize `value` as pretty JSON and write it to `path` via
/// write-to-temp-then-rename, so a crash mid-write never leaves a torn
/// file behind.
///
/// Plain synchronous filesystem I/O — fine to call directly from an async
/// fn here since the session index and cron catalog are small (hundreds
/// of entries) and rewritten only on infrequent mutations, not the hot
/// message path; callers handling larger or hot-path writes should
/// `spawn_blocking` this themselves.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialize a JSON file, returning `Ok(None)` if it does not
/// exist yet (first run).
pub fn read_json_opt<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("data.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json_opt(&path).unwrap().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let back: Option<Vec<i32>> = read_json_opt(&path).unwrap();
        assert!(back.is_none());
    }
}
