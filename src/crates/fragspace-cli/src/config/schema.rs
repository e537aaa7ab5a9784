//! Configuration schema for the fragspace command line

use fragspace_core::ExplorerSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main fragspace configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragspaceConfig {
    /// Exploration engine settings
    #[serde(default)]
    pub explorer: ExplorerSettings,

    /// Building-block library
    #[serde(default)]
    pub library: LibraryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// JSON file holding scaffolds, fragments, capping groups and rules
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter: "trace", "debug", "info", "warn", "error" or a full
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,

    /// Emit one JSON object per event instead of human-readable lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl FragspaceConfig {
    /// Resolve environment variables in every configured path
    ///
    /// Supports `${VAR_NAME}` anywhere in the value. Unset variables are left
    /// untouched.
    pub fn resolve_env_vars(&mut self) {
        let settings = &mut self.explorer;
        expand_path(&mut settings.work_dir);
        for path in [
            &mut settings.db_root,
            &mut settings.checkpoint_file,
            &mut settings.resume_from,
            &mut settings.root_graphs,
            &mut settings.scoring.program,
            &mut self.library.path,
        ]
        .into_iter()
        .flatten()
        {
            expand_path(path);
        }
        expand_path(&mut settings.scoring.uid_file);
    }
}

fn expand_path(path: &mut PathBuf) {
    if let Some(text) = path.to_str() {
        if text.contains("${") {
            *path = PathBuf::from(expand_env_vars(text));
        }
    }
}

/// Replace each `${VAR}` in `value` with the variable's value
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(resolved) => out.push_str(&resolved),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FragspaceConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.library.path.is_none());
        assert_eq!(config.explorer.max_level, 2);
    }

    #[test]
    fn test_partial_toml() {
        let config: FragspaceConfig = toml::from_str(
            r#"
[explorer]
workers = 3

[library]
path = "blocks.json"
"#,
        )
        .unwrap();
        assert_eq!(config.explorer.workers, 3);
        assert_eq!(config.explorer.checkpoint_interval, 100);
        assert_eq!(config.library.path, Some(PathBuf::from("blocks.json")));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("FRAGSPACE_SCHEMA_TEST_DIR", "/data/runs");
        assert_eq!(
            expand_env_vars("${FRAGSPACE_SCHEMA_TEST_DIR}/run1"),
            "/data/runs/run1"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(
            expand_env_vars("${FRAGSPACE_SCHEMA_TEST_UNSET}/x"),
            "${FRAGSPACE_SCHEMA_TEST_UNSET}/x"
        );
        assert_eq!(expand_env_vars("broken ${OPEN"), "broken ${OPEN");
    }

    #[test]
    fn test_resolve_env_vars_in_paths() {
        std::env::set_var("FRAGSPACE_SCHEMA_TEST_LIB", "/libs");
        let mut config = FragspaceConfig::default();
        config.library.path = Some(PathBuf::from("${FRAGSPACE_SCHEMA_TEST_LIB}/blocks.json"));
        config.explorer.work_dir = PathBuf::from("${FRAGSPACE_SCHEMA_TEST_LIB}/work");

        config.resolve_env_vars();

        assert_eq!(config.library.path, Some(PathBuf::from("/libs/blocks.json")));
        assert_eq!(config.explorer.work_dir, PathBuf::from("/libs/work"));
    }
}
