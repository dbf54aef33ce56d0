//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

#![allow(dead_code)] // Some variants/methods are for future use

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(skiff::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A cluster could not be reached
    #[error("Connection error: {message}")]
    #[diagnostic(code(skiff::cli::connect))]
    Connect {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A reconciliation pass or watch failed
    #[error("Sync failed: {message}")]
    #[diagnostic(code(skiff::cli::sync))]
    Sync { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(skiff::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(skiff::cli::error))]
    Other { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(skiff::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Connect { .. } => exit_codes::CONNECT_ERROR,
            CliError::Sync { .. } => exit_codes::SYNC_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a connection error
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
            help: None,
        }
    }

    /// Create a sync error
    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<skiff_core::CoreError> for CliError {
    fn from(err: skiff_core::CoreError) -> Self {
        use skiff_core::CoreError;

        let help = match &err {
            CoreError::MissingField { field } => Some(format!(
                "set `{}` in the config file or pass the matching flag",
                field
            )),
            CoreError::InvalidKind { .. } => {
                Some("supported kinds are `workload` and `service`".to_string())
            }
            _ => None,
        };

        match err {
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::Config {
                message: other.to_string(),
                help,
            },
        }
    }
}

impl From<skiff_kube::KubeError> for CliError {
    fn from(err: skiff_kube::KubeError) -> Self {
        use skiff_kube::KubeError;

        match &err {
            KubeError::Kubeconfig { .. } => CliError::Connect {
                message: err.to_string(),
                help: Some("verify the kubeconfig path exists and is readable".to_string()),
            },
            KubeError::Connect { .. } => CliError::Connect {
                message: err.to_string(),
                help: None,
            },
            KubeError::InvalidConfig(_) => CliError::Config {
                message: err.to_string(),
                help: None,
            },
            KubeError::Io(_) => CliError::Io {
                message: err.to_string(),
            },
            _ => CliError::Sync {
                message: err.to_string(),
            },
        }
    }
}

impl From<miette::Report> for CliError {
    fn from(err: miette::Report) -> Self {
        CliError::Other {
            message: format!("{:?}", err),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Extension trait to convert miette Results to CliError Results
pub trait IntoCliResult<T> {
    fn into_cli_result(self) -> Result<T>;
}

impl<T> IntoCliResult<T> for miette::Result<T> {
    fn into_cli_result(self) -> Result<T> {
        self.map_err(CliError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config("x").exit_code(), exit_codes::CONFIG_ERROR);
        assert_eq!(CliError::connect("x").exit_code(), exit_codes::CONNECT_ERROR);
        assert_eq!(CliError::sync("x").exit_code(), exit_codes::SYNC_ERROR);
        assert_eq!(CliError::io(std::io::Error::other("x")).exit_code(), exit_codes::IO_ERROR);
        assert_eq!(CliError::internal("x").exit_code(), exit_codes::ERROR);
    }

    #[test]
    fn test_missing_field_maps_to_config_error() {
        let err = CliError::from(skiff_core::CoreError::MissingField {
            field: "source.namespace".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::CONFIG_ERROR);
        assert!(err.to_string().contains("source.namespace"));
    }

    #[test]
    fn test_kubeconfig_failure_maps_to_connect_error() {
        let err = CliError::from(skiff_kube::KubeError::Kubeconfig {
            path: "/tmp/missing".to_string(),
            message: "no such file".to_string(),
        });
        assert_eq!(err.exit_code(), exit_codes::CONNECT_ERROR);
    }

    #[test]
    fn test_handler_failure_maps_to_sync_error() {
        let err = CliError::from(skiff_kube::KubeError::Handler("boom".to_string()));
        assert_eq!(err.exit_code(), exit_codes::SYNC_ERROR);
    }
}
