//! Site manifest (`index.yml`) loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Parsed site manifest.
///
/// Never cached: callers re-read it for every task that needs it so edits
/// show up on the next rebuild.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Page title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Fragment names, in page order
    pub includes: Vec<String>,

    /// Code language tabs shown in the page header
    #[serde(default)]
    pub language_tabs: Vec<LanguageTab>,

    /// Name of the syntax highlighting theme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_theme: Option<String>,

    /// Bundle the search scripts; an empty value counts as `false`
    #[serde(default, deserialize_with = "null_as_false")]
    pub search: bool,

    /// Everything else, handed to templates untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

/// One `language_tabs` entry: either `ruby` or `{ ruby: Ruby }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LanguageTab {
    Name(String),
    Labeled(serde_yaml::Mapping),
}

impl LanguageTab {
    /// Tab identifier: the plain string, or the first key of a label object.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name.clone()),
            Self::Labeled(map) => map.keys().next().and_then(value_to_string),
        }
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl BuildConfig {
    /// Parse a manifest from YAML text.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        match value.get("includes") {
            None | Some(Value::Null) => return Err(ConfigError::MissingIncludes),
            Some(_) => {}
        }

        serde_yaml::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Tab identifiers derived from `language_tabs`, in order.
    pub fn language_tab_list(&self) -> Vec<String> {
        self.language_tabs.iter().filter_map(LanguageTab::key).collect()
    }

    /// The configured highlight theme, required by the theme task.
    pub fn require_highlight_theme(&self) -> Result<&str, ConfigError> {
        self.highlight_theme
            .as_deref()
            .ok_or(ConfigError::MissingField("highlight_theme"))
    }
}

/// Read and parse the manifest at `path`.
pub fn read(path: &Path) -> Result<BuildConfig, ConfigError> {
    let source = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let config = BuildConfig::from_yaml(&source)?;
    tracing::debug!(
        "Loaded manifest {} ({} includes)",
        path.display(),
        config.includes.len()
    );
    Ok(config)
}

/// Errors that can occur when loading the manifest.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read manifest {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Invalid YAML in manifest: {0}")]
    Parse(String),

    #[error("Manifest is missing the required `includes` list")]
    MissingIncludes,

    #[error("Manifest is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Unknown highlight theme: {0}")]
    UnknownTheme(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let source = r##"
title: API Reference
language_tabs:
  - shell
  - ruby: Ruby
  - python
includes:
  - intro
  - auth
  - errors
highlight_theme: monokai
search: true
toc_footers:
  - <a href="#">Sign up</a>
"##;

        let config = BuildConfig::from_yaml(source).unwrap();

        assert_eq!(config.title.as_deref(), Some("API Reference"));
        assert_eq!(config.includes, vec!["intro", "auth", "errors"]);
        assert_eq!(config.highlight_theme.as_deref(), Some("monokai"));
        assert!(config.search);
        assert!(config.extra.contains_key("toc_footers"));
    }

    #[test]
    fn search_defaults_to_false() {
        let config = BuildConfig::from_yaml("includes: [intro]").unwrap();

        assert!(!config.search);
        assert!(config.language_tabs.is_empty());
        assert!(config.highlight_theme.is_none());
    }

    #[test]
    fn empty_search_is_false() {
        let blank = BuildConfig::from_yaml("includes: [intro]\nsearch:\n").unwrap();
        let tilde = BuildConfig::from_yaml("includes: [intro]\nsearch: ~\n").unwrap();

        assert!(!blank.search);
        assert!(!tilde.search);
    }

    #[test]
    fn derives_language_tab_list() {
        let config = BuildConfig::from_yaml(
            "includes: []\nlanguage_tabs:\n  - shell\n  - ruby: Ruby\n  - javascript\n",
        )
        .unwrap();

        assert_eq!(
            config.language_tab_list(),
            vec!["shell", "ruby", "javascript"]
        );
    }

    #[test]
    fn errors_on_missing_includes() {
        let result = BuildConfig::from_yaml("title: Docs\nsearch: true\n");

        assert!(matches!(result, Err(ConfigError::MissingIncludes)));
    }

    #[test]
    fn errors_on_invalid_yaml() {
        let result = BuildConfig::from_yaml("includes: [intro\n");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn errors_on_wrongly_typed_includes() {
        let result = BuildConfig::from_yaml("includes: 3\n");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn theme_is_required_on_demand() {
        let config = BuildConfig::from_yaml("includes: []").unwrap();

        assert!(matches!(
            config.require_highlight_theme(),
            Err(ConfigError::MissingField("highlight_theme"))
        ));
    }

    #[test]
    fn reads_from_disk_every_time() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("index.yml");

        std::fs::write(&path, "includes: [intro]").unwrap();
        assert_eq!(read(&path).unwrap().includes, vec!["intro"]);

        std::fs::write(&path, "includes: [intro, auth]").unwrap();
        assert_eq!(read(&path).unwrap().includes, vec!["intro", "auth"]);
    }

    #[test]
    fn errors_on_missing_file() {
        let temp = tempfile::tempdir().unwrap();

        let result = read(&temp.path().join("missing.yml"));

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
