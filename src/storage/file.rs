use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::KeyValueStorage;
use crate::error::{SessionError, SessionResult};

/// Durable storage backed by one JSON object file (`{"key": "value", ...}`).
///
/// Every mutation rewrites the whole document into a sibling temp file and renames it over
/// the target, so readers observe either the old or the new document and never a torn one.
pub struct FileStorage {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

fn tmp_suffix() -> String {
    let mut buf = [0u8; 8];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf(), write_lock: Mutex::new(()) }
    }

    /// Storage file `file_name` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self::new(dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_map(&self) -> SessionResult<BTreeMap<String, String>> {
        if !self.path.exists() { return Ok(BTreeMap::new()); }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SessionError::read(format!("{}: {}", self.path.display(), e)))?;
        if text.trim().is_empty() { return Ok(BTreeMap::new()); }
        serde_json::from_str::<BTreeMap<String, String>>(&text)
            .map_err(|e| SessionError::read(format!("{} is not a string map: {}", self.path.display(), e)))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> SessionResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|e| SessionError::write(format!("{}: {}", dir.display(), e)))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(map).map_err(|e| SessionError::write(e.to_string()))?;
        let file_name = self.path.file_name().and_then(|s| s.to_str()).unwrap_or("session.json");
        let tmp = self.path.with_file_name(format!(".{}.{}.tmp", file_name, tmp_suffix()));
        if let Err(e) = fs::write(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(SessionError::write(format!("{}: {}", tmp.display(), e)));
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(SessionError::write(format!("{}: {}", self.path.display(), e)));
        }
        debug!(target: "crisp::storage", "wrote {} keys to {}", map.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> SessionResult<()> {
        let _guard = self.write_lock.lock();
        let mut map = self.read_map()?;
        for (k, v) in entries {
            map.insert((*k).to_string(), v.clone());
        }
        self.write_map(&map)
    }

    fn remove_all(&self, keys: &[&str]) -> SessionResult<()> {
        let _guard = self.write_lock.lock();
        let (mut map, discarded) = match self.read_map() {
            Ok(m) => (m, false),
            Err(e) => {
                // An unreadable document cannot be edited key by key; replace it with an empty one
                warn!(target: "crisp::storage", "discarding unreadable storage file: {}", e);
                (BTreeMap::new(), true)
            }
        };
        let before = map.len();
        for k in keys { map.remove(*k); }
        if before == map.len() && !discarded { return Ok(()); }
        self.write_map(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = FileStorage::in_dir(tmp.path(), "session.json");
        assert_eq!(fs.get("anything").unwrap(), None);
        assert!(!fs.path().exists());
    }

    #[test]
    fn set_all_creates_parent_dirs_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("state");
        let fs = FileStorage::in_dir(&dir, "session.json");
        fs.set_all(&[("a", "1".into()), ("b", "2".into())]).unwrap();
        assert_eq!(fs.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(fs.get("b").unwrap().as_deref(), Some("2"));
        let names: Vec<String> = std::fs::read_dir(&dir).unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["session.json".to_string()]);
    }

    #[test]
    fn remove_all_keeps_unrelated_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = FileStorage::in_dir(tmp.path(), "s.json");
        fs.set_all(&[("a", "1".into()), ("b", "2".into()), ("theme", "dark".into())]).unwrap();
        fs.remove_all(&["a", "b"]).unwrap();
        assert_eq!(fs.get("a").unwrap(), None);
        assert_eq!(fs.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn garbage_file_is_a_read_error_and_remove_all_recovers() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = FileStorage::in_dir(tmp.path(), "s.json");
        std::fs::write(fs.path(), b"{not json").unwrap();
        assert!(matches!(fs.get("a"), Err(SessionError::StorageRead { .. })));
        fs.remove_all(&["a"]).unwrap();
        assert_eq!(fs.get("a").unwrap(), None);
    }

    #[test]
    fn io_failures_keep_read_and_write_apart() {
        let tmp = tempfile::tempdir().unwrap();
        // a directory where the document should be cannot be read
        let dir_as_file = FileStorage::new(tmp.path());
        assert!(matches!(dir_as_file.get("a"), Err(SessionError::StorageRead { .. })));

        // a regular file where the parent directory should be cannot be written under
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let fs = FileStorage::in_dir(&blocker, "session.json");
        assert!(matches!(fs.set_all(&[("a", "1".into())]), Err(SessionError::StorageWrite { .. })));
    }
}
