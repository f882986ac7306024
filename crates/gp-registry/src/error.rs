// error.rs — Error types for registry values, backends and the policy file codec.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, writing or decoding registry data.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file does not start with the `PReg` signature.
    #[error("invalid policy file signature: {found:#010x}")]
    BadSignature { found: u32 },

    /// The header carries a version other than 1.
    #[error("unsupported policy file version: {found}")]
    UnsupportedVersion { found: u32 },

    /// An entry is structurally malformed (wrong delimiter, truncated data).
    #[error("malformed policy file entry at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// A value could not be encoded (e.g. an embedded NUL in a multi-string).
    #[error("cannot encode value: {reason}")]
    Encode { reason: String },

    /// A backend refused or failed a write.
    #[error("registry backend error on '{key}': {reason}")]
    Backend { key: String, reason: String },

    /// Filesystem I/O error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RegistryError {
    /// True for errors describing a malformed policy file (as opposed to I/O
    /// or backend failures). Best-effort readers downgrade these to "no
    /// evidence".
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            RegistryError::BadSignature { .. }
                | RegistryError::UnsupportedVersion { .. }
                | RegistryError::Malformed { .. }
        )
    }
}
