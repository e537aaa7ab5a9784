//! # fragspace-cli
//!
//! Command line front end for [`fragspace_core`]: layered TOML configuration,
//! logging setup and the handlers behind the `fragspace` binary.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{level_counts, load_checkpoint, render_summary, run, RunOverrides};
pub use config::{ConfigError, ConfigLoader, FragspaceConfig};
