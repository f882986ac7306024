// loader.rs — Loading definition files from disk into a catalog.
//
// `load` accepts a single .admx file or a directory tree. Every definition
// file found is parsed, paired with its localization, and added to the
// catalog; the catalog is linked once at the end. Problems with individual
// files are returned as `LoadFailure`s and never stop the rest of the load.

use std::fs;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use tracing::{debug, info, warn};

use crate::adml::AdmlFile;
use crate::admx::AdmxFile;
use crate::catalog::{Catalog, SourceFile, SourceIdx};
use crate::error::{LoadFailure, LoadFailureKind, TemplateError};
use crate::locale;
use crate::xml;

/// Load a file or directory into a fresh catalog.
pub fn load(path: &Path, locales: &[String]) -> (Catalog, Vec<LoadFailure>) {
    let mut catalog = Catalog::new();
    let failures = catalog.load_path(path, locales);
    (catalog, failures)
}

/// All `.admx` files under `dir`, matched case-insensitively, sorted.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let root = dir
        .to_str()
        .ok_or_else(|| format!("path is not valid UTF-8: {}", dir.display()))?;
    let pattern = format!("{}/**/*.admx", glob::Pattern::escape(root));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let mut found: Vec<PathBuf> = glob::glob_with(&pattern, options)
        .map_err(|e| e.to_string())?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "skipping unreadable path during discovery");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    Ok(found)
}

fn failure(kind: LoadFailureKind, path: &Path, info: impl Into<String>) -> LoadFailure {
    LoadFailure {
        kind,
        path: path.to_path_buf(),
        info: info.into(),
    }
}

fn read_text(path: &Path) -> Result<String, TemplateError> {
    let bytes = fs::read(path).map_err(|e| TemplateError::Markup(e.to_string()))?;
    xml::decode(&bytes)
}

impl Catalog {
    /// Load a file or directory into this catalog and relink.
    pub fn load_path(&mut self, path: &Path, locales: &[String]) -> Vec<LoadFailure> {
        let files = if path.is_dir() {
            match discover(path) {
                Ok(files) => files,
                Err(e) => return vec![failure(LoadFailureKind::BadAdmxParse, path, e)],
            }
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return vec![failure(
                LoadFailureKind::BadAdmxParse,
                path,
                "no such file or directory",
            )];
        };

        let mut failures = Vec::new();
        let mut added = 0;
        for file in &files {
            match self.stage(file, locales) {
                Ok(idx) => {
                    added += 1;
                    debug!(file = %file.display(), source = idx.0, "staged definition file");
                }
                Err(f) => {
                    warn!(error = %f, "definition file skipped");
                    failures.push(f);
                }
            }
        }
        self.link();
        info!(
            path = %path.display(),
            loaded = added,
            failed = failures.len(),
            policies = self.policies().len(),
            "policy definitions loaded"
        );
        failures
    }

    /// Parse one definition file and its localization and add them without
    /// relinking.
    fn stage(&mut self, admx_path: &Path, locales: &[String]) -> Result<SourceIdx, LoadFailure> {
        let admx = read_text(admx_path)
            .and_then(|text| AdmxFile::parse(&text, admx_path))
            .map_err(|e| match e {
                TemplateError::Markup(m) => failure(LoadFailureKind::BadAdmxParse, admx_path, m),
                TemplateError::Schema(m) => failure(LoadFailureKind::BadAdmx, admx_path, m),
            })?;

        if self.has_namespace(&admx.namespace) {
            return Err(failure(
                LoadFailureKind::DuplicateNamespace,
                admx_path,
                admx.namespace,
            ));
        }

        let adml_path = locale::resolve_adml(admx_path, locales)
            .ok_or_else(|| failure(LoadFailureKind::NoAdml, admx_path, ""))?;
        let adml = read_text(&adml_path)
            .and_then(|text| AdmlFile::parse(&text))
            .map_err(|e| match e {
                TemplateError::Markup(m) => failure(LoadFailureKind::BadAdmlParse, admx_path, m),
                TemplateError::Schema(m) => failure(LoadFailureKind::BadAdml, admx_path, m),
            })?;

        let idx = SourceIdx(self.sources.len());
        self.namespaces.insert(admx.namespace.clone(), idx);
        self.sources.push(SourceFile { admx, adml });
        Ok(idx)
    }
}
