use crate::paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfigLayer {
    pub logging: Option<LoggingConfigLayer>,
    pub storage: Option<StorageConfigLayer>,
    pub agent: Option<AgentConfigLayer>,
}

impl AppConfigLayer {
    pub fn apply_to(self, cfg: &mut AppConfig) {
        if let Some(layer) = self.logging {
            cfg.logging.apply(layer);
        }
        if let Some(layer) = self.storage {
            cfg.storage.apply(layer);
        }
        if let Some(layer) = self.agent {
            cfg.agent.apply(layer);
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stdout: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfigLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub stdout: Option<bool>,
}

impl LoggingConfig {
    fn apply(&mut self, layer: LoggingConfigLayer) {
        if let Some(v) = layer.level {
            self.level = v;
        }
        if let Some(v) = layer.json {
            self.json = v;
        }
        if let Some(v) = layer.stdout {
            self.stdout = v;
        }
    }
}

/// Where configured keys are persisted.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Overrides the key file under the data directory.
    pub keys_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct StorageConfigLayer {
    pub keys_file: Option<PathBuf>,
}

impl StorageConfig {
    fn apply(&mut self, layer: StorageConfigLayer) {
        if layer.keys_file.is_some() {
            self.keys_file = layer.keys_file;
        }
    }

    pub fn keys_file(&self, paths: &AppPaths) -> PathBuf {
        self.keys_file
            .clone()
            .unwrap_or_else(|| paths.keys_file.clone())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentBackend {
    /// The running ssh-agent.
    #[default]
    System,
    /// An agent living only as long as the process.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    pub backend: AgentBackend,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AgentConfigLayer {
    pub backend: Option<AgentBackend>,
}

impl AgentConfig {
    fn apply(&mut self, layer: AgentConfigLayer) {
        if let Some(v) = layer.backend {
            self.backend = v;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub paths: AppPaths,
}

impl ConfigManager {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn load(&self, cwd: Option<&Path>, overrides: Option<AppConfigLayer>) -> Result<AppConfig> {
        let mut cfg = AppConfig::default();

        if self.paths.config_file.exists() {
            let layer = Self::load_layer(&self.paths.config_file)?;
            layer.apply_to(&mut cfg);
            debug!(path = %self.paths.config_file.display(), "user config applied");
        }

        if let Some(dir) = cwd {
            let project_path = AppPaths::project_config_path(dir);
            if project_path.exists() {
                let layer = Self::load_layer(&project_path)?;
                layer.apply_to(&mut cfg);
                debug!(path = %project_path.display(), "project config applied");
            }
        }

        if let Some(layer) = overrides {
            layer.apply_to(&mut cfg);
            debug!("config overrides applied");
        }

        Ok(cfg)
    }

    pub fn load_layer(path: &Path) -> Result<AppConfigLayer, ConfigError> {
        let content = fs::read_to_string(path)?;
        let layer: AppConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    pub fn save_default(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let cfg = AppConfig::default();
        let content = toml::to_string_pretty(&cfg).map_err(|e| anyhow::anyhow!(e))?;
        fs::write(&self.paths.config_file, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn apply_layer_overrides() {
        let mut cfg = AppConfig::default();
        let layer = AppConfigLayer {
            logging: Some(LoggingConfigLayer {
                level: Some("debug".to_string()),
                json: Some(true),
                stdout: None,
            }),
            agent: Some(AgentConfigLayer {
                backend: Some(AgentBackend::Memory),
            }),
            ..Default::default()
        };
        layer.apply_to(&mut cfg);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(!cfg.logging.stdout);
        assert_eq!(cfg.agent.backend, AgentBackend::Memory);
        assert!(cfg.storage.keys_file.is_none());
    }

    #[test]
    fn project_file_overrides_user_file() {
        let dir = TempDir::new().unwrap();
        let paths = AppPaths::with_dirs(dir.path().join("config"), dir.path().join("data"));
        let manager = ConfigManager::new(paths.clone());
        manager.save_default().unwrap();

        let project = dir.path().join("project");
        fs::create_dir_all(&project).unwrap();
        fs::write(
            AppPaths::project_config_path(&project),
            "[storage]\nkeys_file = \"/tmp/other.json\"\n[agent]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let cfg = manager.load(Some(&project), None).unwrap();
        assert_eq!(cfg.agent.backend, AgentBackend::Memory);
        assert_eq!(
            cfg.storage.keys_file(&paths),
            PathBuf::from("/tmp/other.json")
        );
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_keys_file_lives_in_data_dir() {
        let paths = AppPaths::with_dirs(PathBuf::from("/c"), PathBuf::from("/d"));
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.keys_file(&paths), PathBuf::from("/d/keys.json"));
    }
}
