pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AgentBackend, AgentConfig, AppConfig, AppConfigLayer, ConfigError, ConfigManager,
    LoggingConfig, StorageConfig,
};
