// error.rs — Load failures for template files.
//
// Loading never aborts on a bad file: each problem becomes a `LoadFailure`
// collected next to the catalog, and the remaining files still load.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// What went wrong with one definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFailureKind {
    /// The ADMX markup could not be read or parsed.
    BadAdmxParse,
    /// The ADMX parsed but violates the definition schema.
    BadAdmx,
    /// No localization file was found for any acceptable locale.
    NoAdml,
    /// The ADML markup could not be read or parsed.
    BadAdmlParse,
    /// The ADML parsed but violates the resource schema.
    BadAdml,
    /// Another loaded file already declared this target namespace.
    DuplicateNamespace,
}

impl fmt::Display for LoadFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadFailureKind::BadAdmxParse => "ADMX markup could not be parsed",
            LoadFailureKind::BadAdmx => "ADMX is invalid",
            LoadFailureKind::NoAdml => "ADML file not found",
            LoadFailureKind::BadAdmlParse => "ADML markup could not be parsed",
            LoadFailureKind::BadAdml => "ADML is invalid",
            LoadFailureKind::DuplicateNamespace => "namespace already in use",
        };
        f.write_str(s)
    }
}

/// A non-fatal failure to load one definition file.
#[derive(Debug, Clone, Error, Serialize)]
#[error("'{}' failed to load: {kind}{}", .path.display(), detail(.info))]
pub struct LoadFailure {
    pub kind: LoadFailureKind,
    /// The definition (.admx) file the failure belongs to.
    pub path: PathBuf,
    pub info: String,
}

fn detail(info: &str) -> String {
    if info.is_empty() {
        String::new()
    } else {
        format!(": {info}")
    }
}

/// Error raised by the single-file parsers. The loader turns it into a
/// `LoadFailure` of the matching ADMX or ADML kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Not well-formed markup (or not decodable text).
    #[error("{0}")]
    Markup(String),
    /// Well-formed, but not what the schema requires.
    #[error("{0}")]
    Schema(String),
}
