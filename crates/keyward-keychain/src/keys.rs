use crate::error::KeychainError;
use ssh_key::{HashAlg, PrivateKey, PublicKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub encrypted: bool,
    pub public: PublicInfo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInfo {
    pub key_type: String,
    pub blob: Vec<u8>,
    pub fingerprint: String,
}

impl PublicInfo {
    pub fn from_public_key(key: &PublicKey) -> Result<Self, KeychainError> {
        let blob = key
            .to_bytes()
            .map_err(|e| KeychainError::Parse(e.to_string()))?;
        Ok(Self {
            key_type: key.algorithm().as_str().to_string(),
            blob,
            fingerprint: key.fingerprint(HashAlg::Sha256).to_string(),
        })
    }
}

pub fn inspect_private_key(text: &str) -> Result<KeyInfo, KeychainError> {
    let key = parse(text)?;
    Ok(KeyInfo {
        encrypted: key.is_encrypted(),
        public: PublicInfo::from_public_key(key.public_key())?,
    })
}

/// Parses an OpenSSH private key, decrypting it when it is encrypted.
pub fn decode_private_key(text: &str, passphrase: &str) -> Result<PrivateKey, KeychainError> {
    let key = parse(text)?;
    if !key.is_encrypted() {
        return Ok(key);
    }
    if passphrase.is_empty() {
        return Err(KeychainError::Decrypt("passphrase required".to_string()));
    }
    key.decrypt(passphrase)
        .map_err(|e| KeychainError::Decrypt(e.to_string()))
}

fn parse(text: &str) -> Result<PrivateKey, KeychainError> {
    PrivateKey::from_openssh(text.trim()).map_err(|e| KeychainError::Parse(e.to_string()))
}
