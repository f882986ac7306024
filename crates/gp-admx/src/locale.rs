// locale.rs — Finding the localization file for a definition file.
//
// For `<dir>/acme.admx` and a preference list, each preferred locale is tried
// in turn:
//
// 1. `<dir>/<locale>/acme.adml`
// 2. `<dir>/<language>/acme.adml` (e.g. `en` for `en-GB`)
// 3. `<dir>/<language>-*/acme.adml`, siblings in sorted order
//
// and finally `<dir>/en-US/acme.adml`. Directory and file names match
// case-insensitively so the same tree resolves on every filesystem.

use std::fs;
use std::path::{Path, PathBuf};

/// Locale used when nothing in the preference list matches.
pub const FALLBACK_LOCALE: &str = "en-US";

/// Language part of a locale tag (`en-GB` → `en`).
pub fn base_language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

fn entries(dir: &Path, want_dir: bool) -> Vec<(String, PathBuf)> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<(String, PathBuf)> = read
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir() == want_dir).unwrap_or(false))
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            Some((name, e.path()))
        })
        .collect();
    out.sort();
    out
}

fn find_ci(dir: &Path, name: &str, want_dir: bool) -> Option<PathBuf> {
    entries(dir, want_dir)
        .into_iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, p)| p)
}

fn adml_in(locale_dir: &Path, file_name: &str) -> Option<PathBuf> {
    find_ci(locale_dir, file_name, false)
}

/// Candidate locale directories for one preferred locale, in order.
fn candidates(dir: &Path, locale: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(exact) = find_ci(dir, locale, true) {
        out.push(exact);
    }
    let language = base_language(locale);
    if !language.eq_ignore_ascii_case(locale) {
        if let Some(base) = find_ci(dir, language, true) {
            out.push(base);
        }
    }
    let prefix = format!("{}-", language.to_ascii_lowercase());
    for (name, path) in entries(dir, true) {
        if name.to_ascii_lowercase().starts_with(&prefix) && !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// Locate the ADML file for `admx_path`, or `None` when no acceptable
/// localization exists.
pub fn resolve_adml(admx_path: &Path, preferences: &[String]) -> Option<PathBuf> {
    let dir = admx_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = admx_path.file_stem()?.to_str()?;
    let file_name = format!("{stem}.adml");

    preferences
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(FALLBACK_LOCALE))
        .flat_map(|locale| candidates(dir, locale))
        .find_map(|locale_dir| adml_in(&locale_dir, &file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn exact_locale_wins() {
        let dir = tempfile::tempdir().unwrap();
        let admx = dir.path().join("acme.admx");
        touch(&dir.path().join("de-DE/acme.adml"));
        touch(&dir.path().join("en-US/acme.adml"));
        let found = resolve_adml(&admx, &["de-DE".to_string()]).unwrap();
        assert!(found.ends_with("de-DE/acme.adml"));
    }

    #[test]
    fn regional_variant_falls_back_to_sibling_of_same_language() {
        let dir = tempfile::tempdir().unwrap();
        let admx = dir.path().join("acme.admx");
        touch(&dir.path().join("en-US/acme.adml"));
        touch(&dir.path().join("fr-FR/acme.adml"));
        let found = resolve_adml(&admx, &["en-GB".to_string()]).unwrap();
        assert!(found.ends_with("en-US/acme.adml"));
    }

    #[test]
    fn base_language_directory_is_tried_before_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let admx = dir.path().join("acme.admx");
        touch(&dir.path().join("en/acme.adml"));
        touch(&dir.path().join("en-AU/acme.adml"));
        let found = resolve_adml(&admx, &["en-GB".to_string()]).unwrap();
        assert!(found.ends_with("en/acme.adml"));
    }

    #[test]
    fn names_match_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let admx = dir.path().join("Acme.admx");
        touch(&dir.path().join("EN-us/ACME.ADML"));
        assert!(resolve_adml(&admx, &[]).is_some());
    }

    #[test]
    fn unrelated_languages_end_in_fallback_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let admx = dir.path().join("acme.admx");
        touch(&dir.path().join("fr-FR/acme.adml"));
        assert!(resolve_adml(&admx, &["ja-JP".to_string()]).is_none());

        touch(&dir.path().join("en-US/acme.adml"));
        let found = resolve_adml(&admx, &["ja-JP".to_string()]).unwrap();
        assert!(found.ends_with("en-US/acme.adml"));
    }
}
