use crate::error::KeychainError;
use crate::keys::{decode_private_key, PublicInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use russh::keys::agent::client::{AgentClient, AgentStream};
use ssh_key::{LineEnding, PrivateKey};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn identities(&self) -> Result<Vec<PublicInfo>, KeychainError>;
    async fn add(&self, key: &PrivateKey) -> Result<(), KeychainError>;
    async fn remove(&self, blob: &[u8]) -> Result<(), KeychainError>;
}

#[derive(Clone, Default)]
pub struct MemoryAgent {
    keys: Arc<Mutex<Vec<(PublicInfo, PrivateKey)>>>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: PrivateKey) -> Result<(), KeychainError> {
        let info = PublicInfo::from_public_key(key.public_key())?;
        debug!(fingerprint = %info.fingerprint, "memory agent: adding key");
        let mut keys = self.keys.lock();
        keys.retain(|(existing, _)| existing.blob != info.blob);
        keys.push((info, key));
        Ok(())
    }

    pub fn insert_openssh(&self, text: &str) -> Result<(), KeychainError> {
        self.insert(decode_private_key(text, "")?)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[async_trait]
impl Agent for MemoryAgent {
    async fn identities(&self) -> Result<Vec<PublicInfo>, KeychainError> {
        Ok(self.keys.lock().iter().map(|(info, _)| info.clone()).collect())
    }

    async fn add(&self, key: &PrivateKey) -> Result<(), KeychainError> {
        self.insert(key.clone())
    }

    async fn remove(&self, blob: &[u8]) -> Result<(), KeychainError> {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|(info, _)| info.blob != blob);
        if keys.len() == before {
            return Err(KeychainError::Agent("key not found".to_string()));
        }
        Ok(())
    }
}

/// The user's running ssh-agent, reached through `SSH_AUTH_SOCK`.
pub struct SystemAgent {
    client: tokio::sync::Mutex<AgentClient<Box<dyn AgentStream + Send + Unpin>>>,
}

impl SystemAgent {
    pub async fn connect() -> Result<Self, KeychainError> {
        #[cfg(unix)]
        let client = AgentClient::connect_env()
            .await
            .map_err(|e| KeychainError::Agent(e.to_string()))?;

        #[cfg(windows)]
        let client = {
            use tokio::net::windows::named_pipe::ClientOptions;
            let sock = std::env::var("SSH_AUTH_SOCK")
                .unwrap_or_else(|_| "\\\\.\\pipe\\openssh-ssh-agent".to_string());
            let stream = ClientOptions::new().open(sock)?;
            AgentClient::connect(stream)
        };

        Ok(Self {
            client: tokio::sync::Mutex::new(client.dynamic()),
        })
    }
}

#[async_trait]
impl Agent for SystemAgent {
    async fn identities(&self) -> Result<Vec<PublicInfo>, KeychainError> {
        let keys = self
            .client
            .lock()
            .await
            .request_identities()
            .await
            .map_err(|e| KeychainError::Agent(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let blob = key
                .to_bytes()
                .map_err(|e| KeychainError::Parse(e.to_string()))?;
            out.push(PublicInfo {
                key_type: key.algorithm().as_str().to_string(),
                blob,
                fingerprint: key.fingerprint(russh::keys::HashAlg::Sha256).to_string(),
            });
        }
        Ok(out)
    }

    async fn add(&self, key: &PrivateKey) -> Result<(), KeychainError> {
        // The agent client has its own key types; hand the key over as text.
        let text = key
            .to_openssh(LineEnding::LF)
            .map_err(|e| KeychainError::Parse(e.to_string()))?;
        let key = russh::keys::PrivateKey::from_openssh(text.as_str())
            .map_err(|e| KeychainError::Parse(e.to_string()))?;
        self.client
            .lock()
            .await
            .add_identity(&key, &[])
            .await
            .map_err(|e| KeychainError::Agent(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, blob: &[u8]) -> Result<(), KeychainError> {
        let mut client = self.client.lock().await;
        let keys = client
            .request_identities()
            .await
            .map_err(|e| KeychainError::Agent(e.to_string()))?;
        let target = keys
            .into_iter()
            .find(|key| key.to_bytes().map(|b| b == blob).unwrap_or(false))
            .ok_or_else(|| KeychainError::Agent("key not found".to_string()))?;
        client
            .remove_identity(&target)
            .await
            .map_err(|e| KeychainError::Agent(e.to_string()))?;
        Ok(())
    }
}
