use crate::agent::Agent;
use crate::error::KeychainError;
use crate::keys::{decode_private_key, inspect_private_key};
use crate::store::{KeyStore, StoredKey};
use async_trait::async_trait;
use keyward_core::{ConfiguredKey, KeyId, LoadedKey};
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[async_trait]
pub trait KeyManager: Send + Sync {
    async fn configured(&self) -> Result<Vec<ConfiguredKey>, KeychainError>;
    async fn loaded(&self) -> Result<Vec<LoadedKey>, KeychainError>;
    async fn add(&self, name: &str, private_key: &str) -> Result<(), KeychainError>;
    async fn load(&self, id: &KeyId, passphrase: &str) -> Result<(), KeychainError>;
    async fn unload(&self, key: &LoadedKey) -> Result<(), KeychainError>;
    /// Removing an id that is not configured succeeds without effect.
    async fn remove(&self, id: &KeyId) -> Result<(), KeychainError>;
}

pub struct LocalKeyManager<A> {
    store: KeyStore,
    agent: A,
}

impl<A: Agent> LocalKeyManager<A> {
    pub fn new(store: KeyStore, agent: A) -> Self {
        Self { store, agent }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }
}

#[async_trait]
impl<A: Agent> KeyManager for LocalKeyManager<A> {
    async fn configured(&self) -> Result<Vec<ConfiguredKey>, KeychainError> {
        Ok(self.store.list().iter().map(StoredKey::configured).collect())
    }

    async fn loaded(&self) -> Result<Vec<LoadedKey>, KeychainError> {
        let by_fingerprint: HashMap<String, KeyId> = self
            .store
            .list()
            .iter()
            .filter_map(|r| r.fingerprint.clone().map(|fp| (fp, r.id.clone())))
            .collect();
        let identities = self.agent.identities().await?;
        Ok(identities
            .into_iter()
            .map(|info| {
                let id = by_fingerprint.get(&info.fingerprint).cloned();
                let key = LoadedKey::new(info.key_type, info.blob);
                match id {
                    Some(id) => key.with_id(id),
                    None => key,
                }
            })
            .collect())
    }

    async fn add(&self, name: &str, private_key: &str) -> Result<(), KeychainError> {
        if name.is_empty() {
            return Err(KeychainError::InvalidName(
                "name must not be empty".to_string(),
            ));
        }
        // Text that does not parse is kept as-is; it fails when loaded.
        let (encrypted, fingerprint) = match inspect_private_key(private_key) {
            Ok(info) => (info.encrypted, Some(info.public.fingerprint)),
            Err(err) => {
                debug!(error = %err, "added key is not a parseable private key");
                (false, None)
            }
        };
        let id = KeyId::generate();
        self.store.insert(StoredKey {
            id: id.clone(),
            name: name.to_string(),
            encrypted,
            fingerprint,
            private_key: private_key.to_string(),
        })?;
        info!(key_id = %id, encrypted, "key added");
        Ok(())
    }

    async fn load(&self, id: &KeyId, passphrase: &str) -> Result<(), KeychainError> {
        let record = self.store.get(id).ok_or(KeychainError::NotFound)?;
        let key = decode_private_key(&record.private_key, passphrase).map_err(|err| {
            if let KeychainError::Parse(reason) = &err {
                warn!(key_id = %id, reason = %reason, "stored private key is malformed");
            }
            err
        })?;
        self.agent.add(&key).await?;
        info!(key_id = %id, "key loaded");
        Ok(())
    }

    async fn unload(&self, key: &LoadedKey) -> Result<(), KeychainError> {
        self.agent
            .remove(&key.blob)
            .await
            .map_err(|err| match err {
                KeychainError::Agent(reason) => {
                    KeychainError::Agent(format!("key unload failed: {reason}"))
                }
                other => other,
            })?;
        info!(key_type = %key.key_type, "key unloaded");
        Ok(())
    }

    async fn remove(&self, id: &KeyId) -> Result<(), KeychainError> {
        let existed = self.store.remove(id)?;
        if existed {
            info!(key_id = %id, "key removed");
        } else {
            debug!(key_id = %id, "remove of unknown key ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MemoryAgent;
    use crate::testdata::{WITHOUT_PASSPHRASE, WITH_PASSPHRASE};

    fn manager() -> LocalKeyManager<MemoryAgent> {
        LocalKeyManager::new(KeyStore::in_memory(), MemoryAgent::new())
    }

    async fn only_id(mgr: &LocalKeyManager<MemoryAgent>) -> KeyId {
        let configured = mgr.configured().await.unwrap();
        assert_eq!(configured.len(), 1);
        configured[0].id.clone()
    }

    #[tokio::test]
    async fn add_records_encryption() {
        let mgr = manager();
        mgr.add("plain", WITHOUT_PASSPHRASE.private).await.unwrap();
        mgr.add("locked", WITH_PASSPHRASE.private).await.unwrap();
        let mut configured = mgr.configured().await.unwrap();
        configured.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(configured[0].name, "locked");
        assert!(configured[0].encrypted);
        assert_eq!(configured[1].name, "plain");
        assert!(!configured[1].encrypted);
    }

    #[tokio::test]
    async fn add_rejects_empty_name() {
        let mgr = manager();
        let err = mgr.add("", "private-key").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid name: name must not be empty");
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(mgr.configured().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_and_unload_roundtrip() {
        let mgr = manager();
        mgr.add("locked", WITH_PASSPHRASE.private).await.unwrap();
        let id = only_id(&mgr).await;

        mgr.load(&id, WITH_PASSPHRASE.passphrase).await.unwrap();
        let loaded = mgr.loaded().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.as_ref(), Some(&id));
        assert_eq!(loaded[0].key_type, WITH_PASSPHRASE.key_type);
        assert_eq!(loaded[0].blob_base64(), WITH_PASSPHRASE.blob);

        mgr.unload(&loaded[0]).await.unwrap();
        assert!(mgr.loaded().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_with_wrong_passphrase_fails() {
        let mgr = manager();
        mgr.add("locked", WITH_PASSPHRASE.private).await.unwrap();
        let id = only_id(&mgr).await;
        let err = mgr.load(&id, "incorrect-passphrase").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Backend);
        assert!(mgr.agent().is_empty());
    }

    #[tokio::test]
    async fn load_of_unparseable_key_is_parse_error() {
        let mgr = manager();
        mgr.add("junk", "private-key").await.unwrap();
        let id = only_id(&mgr).await;
        let err = mgr.load(&id, "").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[tokio::test]
    async fn loaded_key_without_configuration_has_no_id() {
        let mgr = manager();
        mgr.agent().insert_openssh(WITHOUT_PASSPHRASE.private).unwrap();
        let loaded = mgr.loaded().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, None);
    }

    #[tokio::test]
    async fn unload_unknown_key_fails() {
        let mgr = manager();
        let err = mgr
            .unload(&LoadedKey::new("bogus-type", b"bogus-blob".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "agent: key unload failed: key not found");
    }

    #[tokio::test]
    async fn remove_unknown_id_is_noop() {
        let mgr = manager();
        mgr.add("plain", WITHOUT_PASSPHRASE.private).await.unwrap();
        mgr.remove(&KeyId::new("bogus-id")).await.unwrap();
        assert_eq!(mgr.configured().await.unwrap().len(), 1);
    }
}
