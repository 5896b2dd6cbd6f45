pub mod error;
pub mod keys;
pub mod reconcile;

pub use error::CoreError;
pub use keys::{ConfiguredKey, DisplayedKey, KeyId, LoadedKey};
pub use reconcile::reconcile;
