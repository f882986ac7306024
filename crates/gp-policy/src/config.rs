// config.rs — Engine configuration.
//
// EngineConfig says where policy definitions live, which localizations to
// prefer, where the per-scope policy files are and which backend wins when
// reading state. `for_system_root()` produces the standard Windows layout;
// `load()` reads a TOML file in which every field is optional.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::editor::Scope;
use crate::error::ConfigError;

/// System root used when `SystemRoot` is not set.
pub const DEFAULT_SYSTEM_ROOT: &str = r"C:\Windows";

/// Locale every preference list ends with.
pub const FALLBACK_LOCALE: &str = gp_admx::locale::FALLBACK_LOCALE;

/// Which backend answers a state read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadPrecedence {
    /// The policy file when it holds any evidence for the policy, otherwise
    /// the live registry.
    #[default]
    FileThenLive,
    LiveOnly,
    FileOnly,
}

/// Configuration for a policy engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory (or single file) of ADMX definitions.
    pub definitions_dir: PathBuf,

    /// Preferred localizations, most preferred first.
    pub locales: Vec<String>,

    /// Policy file mirrored for machine-scope writes.
    pub machine_policy_file: PathBuf,

    /// Policy file mirrored for user-scope writes.
    pub user_policy_file: PathBuf,

    pub read_precedence: ReadPrecedence,

    /// Merge Machine/User copies of the same policy into one `Both` policy.
    pub merge_scope_duplicates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_system_root(DEFAULT_SYSTEM_ROOT)
    }
}

impl EngineConfig {
    /// Standard layout under a Windows system root.
    pub fn for_system_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            definitions_dir: root.join("PolicyDefinitions"),
            locales: vec![FALLBACK_LOCALE.to_string()],
            machine_policy_file: Scope::Machine.policy_file_path(root),
            user_policy_file: Scope::User.policy_file_path(root),
            read_precedence: ReadPrecedence::default(),
            merge_scope_duplicates: true,
        }
    }

    /// Standard layout for this machine, with locales from the environment.
    pub fn from_env() -> Self {
        let root = env::var_os("SystemRoot")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SYSTEM_ROOT));
        Self {
            locales: detect_locales(),
            ..Self::for_system_root(root)
        }
    }

    /// Read a TOML config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn policy_file(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Machine => &self.machine_policy_file,
            Scope::User => &self.user_policy_file,
        }
    }
}

/// Normalize a locale as found in the environment: `tr_tr.UTF-8` → `tr-TR`.
/// Returns `None` for values that are not `language-region` shaped.
pub fn normalize_locale(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let raw = raw.split(['.', '@']).next().unwrap_or(raw);
    let mut parts = raw.split(['_', '-']);
    let language = parts.next().filter(|l| (2..=3).contains(&l.len()))?;
    let region = parts.next().filter(|r| !r.is_empty())?;
    Some(format!(
        "{}-{}",
        language.to_ascii_lowercase(),
        region.to_ascii_uppercase()
    ))
}

/// Preferred locales from `LANG`, `PreferredLanguage` and `UILanguage`, in
/// that order, without duplicates, always ending with `en-US`.
pub fn detect_locales() -> Vec<String> {
    locales_from(
        ["LANG", "PreferredLanguage", "UILanguage"]
            .iter()
            .filter_map(|var| env::var(var).ok()),
    )
}

fn locales_from(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for locale in values
        .into_iter()
        .filter_map(|v| normalize_locale(&v))
        .chain(std::iter::once(FALLBACK_LOCALE.to_string()))
    {
        if !out.contains(&locale) {
            out.push(locale);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_environment_spellings() {
        assert_eq!(normalize_locale("tr_tr.UTF-8").as_deref(), Some("tr-TR"));
        assert_eq!(normalize_locale(" EN-gb ").as_deref(), Some("en-GB"));
        assert_eq!(normalize_locale("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(normalize_locale("C"), None);
        assert_eq!(normalize_locale("C.UTF-8"), None);
        assert_eq!(normalize_locale("en"), None);
    }

    #[test]
    fn preference_order_is_kept_and_fallback_appended() {
        let locales = locales_from(vec![
            "fr_FR.UTF-8".to_string(),
            "garbage".to_string(),
            "fr-fr".to_string(),
        ]);
        assert_eq!(locales, vec!["fr-FR", "en-US"]);
        assert_eq!(locales_from(Vec::new()), vec!["en-US"]);
    }

    #[test]
    fn standard_layout() {
        let cfg = EngineConfig::for_system_root(r"C:\Windows");
        assert!(cfg.definitions_dir.ends_with("PolicyDefinitions"));
        assert!(cfg.machine_policy_file.ends_with("Registry.pol"));
        assert_ne!(cfg.machine_policy_file, cfg.user_policy_file);
        assert_eq!(cfg.read_precedence, ReadPrecedence::FileThenLive);
    }

    #[test]
    fn load_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(
            &path,
            "definitions_dir = \"/defs\"\nread_precedence = \"live-only\"\nlocales = [\"de-DE\"]\n",
        )
        .unwrap();
        let cfg = EngineConfig::load(&path).unwrap();
        assert_eq!(cfg.definitions_dir, PathBuf::from("/defs"));
        assert_eq!(cfg.read_precedence, ReadPrecedence::LiveOnly);
        assert_eq!(cfg.locales, vec!["de-DE"]);
        assert!(cfg.merge_scope_duplicates);

        fs::write(&path, "read_precedence = \"sometimes\"\n").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
