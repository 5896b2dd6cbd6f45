use crate::error::CoreError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned by the key manager to a configured key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Persisted key metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredKey {
    pub id: KeyId,
    pub name: String,
    /// The private key requires a passphrase to load.
    pub encrypted: bool,
}

/// A key currently held by the agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedKey {
    /// Key algorithm, e.g. `ssh-ed25519`.
    pub key_type: String,
    /// Public key in SSH wire encoding.
    pub blob: Vec<u8>,
    /// Configured key this loaded key was recognised as, if any.
    pub id: Option<KeyId>,
}

impl LoadedKey {
    pub fn new(key_type: impl Into<String>, blob: Vec<u8>) -> Self {
        Self {
            key_type: key_type.into(),
            blob,
            id: None,
        }
    }

    pub fn with_id(mut self, id: KeyId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn blob_base64(&self) -> String {
        STANDARD.encode(&self.blob)
    }
}

/// A row of the key list shown to the user.
///
/// An `id` of `None` marks a key without a configured entry; such keys can
/// only be looked at, not loaded, unloaded or removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedKey {
    pub id: Option<KeyId>,
    pub loaded: bool,
    /// Only meaningful while the key is not loaded.
    pub encrypted: bool,
    pub name: String,
    pub key_type: String,
    /// Base64 of the public key blob; empty when not loaded.
    pub blob: String,
}

impl DisplayedKey {
    pub fn is_controllable(&self) -> bool {
        self.id.is_some()
    }

    /// Rebuilds the agent handle needed to unload this key.
    pub fn loaded_key(&self) -> Result<LoadedKey, CoreError> {
        let blob = STANDARD.decode(&self.blob)?;
        let mut key = LoadedKey::new(self.key_type.clone(), blob);
        key.id = self.id.clone();
        Ok(key)
    }
}
