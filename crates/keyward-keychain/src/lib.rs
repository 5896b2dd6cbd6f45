pub mod agent;
pub mod error;
pub mod keys;
pub mod manager;
pub mod store;
pub mod testdata;

pub use agent::{Agent, MemoryAgent, SystemAgent};
pub use error::{ErrorKind, KeychainError};
pub use keys::{KeyInfo, PublicInfo};
pub use manager::{KeyManager, LocalKeyManager};
pub use store::{KeyStore, StoredKey};
