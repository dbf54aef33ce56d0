//! Command implementations

pub mod daemon;
pub mod sync;

use std::path::Path;

use skiff_core::{ResourceKind, SyncConfig};

use crate::error::{CliError, Result};

/// Load the configuration backing both commands.
///
/// An explicitly passed path must exist; the default location is optional
/// and falls back to built-in defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_with_help(
                    format!("config file not found: {}", path.display()),
                    "pass --config with an existing file or unset SKIFF_CONFIG",
                ));
            }
            Ok(SyncConfig::load_from(path)?)
        }
        None => Ok(SyncConfig::load()?),
    }
}

/// Parse `-k/--kinds` flag values
pub fn parse_kinds(values: &[String]) -> Result<Vec<ResourceKind>> {
    values
        .iter()
        .map(|value| value.parse::<ResourceKind>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CliError::from)
}
