//! Layered configuration for the fragspace command line

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{expand_env_vars, FragspaceConfig, LibraryConfig, LoggingConfig};
