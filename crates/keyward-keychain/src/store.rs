use crate::error::KeychainError;
use keyward_core::{ConfiguredKey, KeyId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

#[derive(Clone, Serialize, Deserialize)]
pub struct StoredKey {
    pub id: KeyId,
    pub name: String,
    pub encrypted: bool,
    /// SHA-256 fingerprint of the public key; absent when the key text could
    /// not be parsed when it was added.
    pub fingerprint: Option<String>,
    pub private_key: String,
}

impl StoredKey {
    pub fn configured(&self) -> ConfiguredKey {
        ConfiguredKey {
            id: self.id.clone(),
            name: self.name.clone(),
            encrypted: self.encrypted,
        }
    }
}

impl fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredKey")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("encrypted", &self.encrypted)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

#[derive(Debug)]
pub struct KeyStore {
    path: Option<PathBuf>,
    records: Mutex<Vec<StoredKey>>,
}

impl KeyStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn open(path: PathBuf) -> Result<Self, KeychainError> {
        let records = read_records(&path)?;
        Ok(Self {
            path: Some(path),
            records: Mutex::new(records),
        })
    }

    pub fn list(&self) -> Vec<StoredKey> {
        self.records.lock().clone()
    }

    pub fn get(&self, id: &KeyId) -> Option<StoredKey> {
        self.records.lock().iter().find(|r| &r.id == id).cloned()
    }

    /// The record list only changes once it has been written out.
    pub fn insert(&self, record: StoredKey) -> Result<(), KeychainError> {
        let mut records = self.records.lock();
        let mut next: Vec<StoredKey> = records
            .iter()
            .filter(|r| r.id != record.id)
            .cloned()
            .collect();
        next.push(record);
        self.flush(&next)?;
        *records = next;
        Ok(())
    }

    pub fn remove(&self, id: &KeyId) -> Result<bool, KeychainError> {
        let mut records = self.records.lock();
        if !records.iter().any(|r| &r.id == id) {
            return Ok(false);
        }
        let next: Vec<StoredKey> = records.iter().filter(|r| &r.id != id).cloned().collect();
        self.flush(&next)?;
        *records = next;
        Ok(true)
    }

    fn flush(&self, records: &[StoredKey]) -> Result<(), KeychainError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = Zeroizing::new(
            serde_json::to_vec_pretty(records)
                .map_err(|e| KeychainError::Storage(e.to_string()))?,
        );
        let tmp = path.with_extension("json.tmp");
        if let Err(err) = write_private(&tmp, &data) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<StoredKey>, KeychainError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| {
        warn!(path = %path.display(), error = %e, "key store is malformed");
        KeychainError::Parse(format!("key store {}: {e}", path.display()))
    })
}

fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, name: &str) -> StoredKey {
        StoredKey {
            id: KeyId::new(id),
            name: name.to_string(),
            encrypted: false,
            fingerprint: None,
            private_key: "private-key".to_string(),
        }
    }

    #[test]
    fn file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("nested").join("keys.json");
        let store = KeyStore::open(file.clone()).unwrap();
        store.insert(record("k1", "work")).unwrap();
        store.insert(record("k2", "home")).unwrap();
        assert!(store.remove(&KeyId::new("k1")).unwrap());

        let reopened = KeyStore::open(file).unwrap();
        let names: Vec<String> = reopened.list().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["home".to_string()]);
        assert_eq!(reopened.get(&KeyId::new("k2")).unwrap().private_key, "private-key");
    }

    #[test]
    fn failed_insert_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let store = KeyStore::open(blocker.join("keys.json")).unwrap();

        let err = store.insert(record("k1", "work")).unwrap_err();
        assert!(matches!(err, KeychainError::Io(_)));
        assert!(store.list().is_empty());
    }

    #[test]
    fn failed_remove_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let store = KeyStore::open(data.join("keys.json")).unwrap();
        store.insert(record("k1", "work")).unwrap();

        fs::remove_dir_all(&data).unwrap();
        fs::write(&data, b"not a directory").unwrap();

        assert!(store.remove(&KeyId::new("k1")).is_err());
        assert_eq!(store.list().len(), 1);
        assert!(store.get(&KeyId::new("k1")).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("keys.json");
        let store = KeyStore::open(file.clone()).unwrap();
        store.insert(record("k1", "work")).unwrap();
        store.insert(record("k2", "home")).unwrap();

        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!file.with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_unknown_is_noop() {
        let store = KeyStore::in_memory();
        store.insert(record("k1", "work")).unwrap();
        assert!(!store.remove(&KeyId::new("bogus")).unwrap());
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("keys.json");
        fs::write(&file, b"{not json").unwrap();
        let err = KeyStore::open(file).unwrap_err();
        assert!(matches!(err, KeychainError::Parse(_)));
    }

    #[test]
    fn debug_omits_private_key() {
        let shown = format!("{:?}", record("k1", "work"));
        assert!(!shown.contains("private-key"));
    }
}
