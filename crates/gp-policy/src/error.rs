// error.rs — Error types for mutation, option conversion and configuration.

use std::path::PathBuf;

use gp_registry::RegistryError;
use thiserror::Error;

use crate::state::PolicyState;

/// Errors that can occur while applying a target state to a backend.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Only Enabled, Disabled and NotConfigured can be written.
    #[error("'{state}' is not a state that can be applied")]
    InvalidTarget { state: PolicyState },

    /// The policy does not apply to the scope being written.
    #[error("policy '{policy_id}' does not apply to the {scope} scope")]
    WrongScope { policy_id: String, scope: String },

    /// An option was supplied for an element the policy does not have.
    #[error("policy has no element '{element}'")]
    UnknownElement { element: String },

    /// An option value does not fit its element.
    #[error("invalid value for element '{element}': {reason}")]
    InvalidOption { element: String, reason: String },

    /// A required element has no value.
    #[error("element '{element}' is required")]
    MissingOption { element: String },

    /// An element has nowhere to write (no value name of its own or inherited).
    #[error("element '{element}' has no value name")]
    NoValueName { element: String },

    /// The backend rejected a write.
    #[error(transparent)]
    Backend(#[from] RegistryError),
}

/// Errors converting external (JSON) option values.
#[derive(Debug, Error)]
pub enum OptionError {
    #[error("policy has no element '{element}'")]
    UnknownElement { element: String },

    #[error("element '{element}' expects {expected}")]
    WrongType {
        element: String,
        expected: &'static str,
    },

    #[error("options must be a JSON object")]
    NotAnObject,
}

/// Errors loading engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
