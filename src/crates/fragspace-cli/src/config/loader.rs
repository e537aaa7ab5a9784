//! Configuration loader with layered locations
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.fragspace/fragspace.toml
//! 3. Project-level config: ./.fragspace/fragspace.toml
//! 4. An explicit file given on the command line
//!
//! Later layers override earlier ones key by key, so a project file that only
//! sets `explorer.workers` keeps every other value from the user file.

use crate::config::schema::FragspaceConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration loader that handles user, project and explicit configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(".fragspace").join("fragspace.toml")),
            project_config_path: PathBuf::from(".fragspace").join("fragspace.toml"),
            explicit_config_path: None,
        }
    }

    /// Also load `path`, which must exist, on top of the other layers
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_config_path = Some(path.into());
        self
    }

    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }

    /// Load and merge every layer, then resolve environment variables
    pub async fn load(&self) -> Result<FragspaceConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in self.user_config_path.iter().chain([&self.project_config_path]) {
            match self.load_from_path(path).await {
                Ok(layer) => {
                    debug!(path = %path.display(), "Loaded config layer");
                    merge_values(&mut merged, layer);
                }
                Err(ConfigError::NotFound(_)) => {
                    debug!(path = %path.display(), "Config layer not found, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(path) = &self.explicit_config_path {
            let layer = self.load_from_path(path).await?;
            debug!(path = %path.display(), "Loaded explicit config");
            merge_values(&mut merged, layer);
        }

        let mut config: FragspaceConfig = merged.try_into()?;
        config.resolve_env_vars();

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn load_from_path(&self, path: &Path) -> Result<toml::Value> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge `overlay` into `base`; tables merge recursively, anything else is
/// replaced
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn isolated(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::new()
            .with_user_path(Some(dir.path().join("user.toml")))
            .with_project_path(dir.path().join("project.toml"))
    }

    #[test]
    fn test_config_paths() {
        let loader = ConfigLoader::new();
        assert!(loader.project_config_path().ends_with(".fragspace/fragspace.toml"));
        if let Some(user) = loader.user_config_path() {
            assert!(user.ends_with(".fragspace/fragspace.toml"));
        }
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let dir = TempDir::new().unwrap();
        let config = isolated(&dir).load().await.unwrap();
        assert_eq!(config, FragspaceConfig::default());
    }

    #[tokio::test]
    async fn test_project_overrides_user_key_by_key() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("user.toml"),
            "[explorer]\nworkers = 8\nmax_level = 4\n\n[logging]\nlevel = \"debug\"\n",
        )
        .await
        .unwrap();
        fs::write(dir.path().join("project.toml"), "[explorer]\nworkers = 2\n")
            .await
            .unwrap();

        let config = isolated(&dir).load().await.unwrap();

        assert_eq!(config.explorer.workers, 2);
        assert_eq!(config.explorer.max_level, 4);
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    async fn test_explicit_file_wins_and_must_exist() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("project.toml"), "[explorer]\nmax_level = 1\n")
            .await
            .unwrap();
        let explicit = dir.path().join("run.toml");
        fs::write(&explicit, "[explorer]\nmax_level = 3\n").await.unwrap();

        let config = isolated(&dir).with_explicit(&explicit).load().await.unwrap();
        assert_eq!(config.explorer.max_level, 3);

        let missing = isolated(&dir).with_explicit(dir.path().join("nope.toml")).load().await;
        assert!(matches!(missing, Err(ConfigError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("project.toml"), "[explorer\nworkers = ")
            .await
            .unwrap();

        let result = isolated(&dir).load().await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_wrong_type_is_invalid() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("project.toml"), "[explorer]\nworkers = \"many\"\n")
            .await
            .unwrap();

        let result = isolated(&dir).load().await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
