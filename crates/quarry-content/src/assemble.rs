//! Ordered fragment assembly from the manifest's `includes`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::manifest::BuildConfig;
use crate::render::{render_markdown, RenderError};

/// File extension of fragment sources.
pub const FRAGMENT_EXTENSION: &str = "md";

/// One rendered Markdown include.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeFragment {
    /// Name as listed in the manifest
    pub name: String,

    /// Markdown source
    pub markdown: String,

    /// Rendered HTML
    pub html: String,
}

/// Errors that can occur while assembling fragments.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Include '{name}' not found at {}", path.display())]
    IncludeNotFound { name: String, path: PathBuf },

    #[error("Failed to read include {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render include '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: RenderError,
    },
}

/// Path of the fragment source for `name`.
pub fn fragment_path(includes_dir: &Path, name: &str) -> PathBuf {
    includes_dir.join(format!("{}.{}", name, FRAGMENT_EXTENSION))
}

/// Load and render every include named by `config`, in manifest order.
///
/// All-or-nothing: the first missing or unrenderable include aborts the
/// assembly and no fragments are returned.
pub fn assemble(
    config: &BuildConfig,
    includes_dir: &Path,
) -> Result<Vec<IncludeFragment>, ContentError> {
    config
        .includes
        .iter()
        .map(|name| load_fragment(includes_dir, name))
        .collect()
}

fn load_fragment(includes_dir: &Path, name: &str) -> Result<IncludeFragment, ContentError> {
    let path = fragment_path(includes_dir, name);

    let markdown = fs::read_to_string(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ContentError::IncludeNotFound {
            name: name.to_string(),
            path: path.clone(),
        },
        _ => ContentError::Read {
            path: path.clone(),
            source: e,
        },
    })?;

    let html = render_markdown(&markdown).map_err(|source| ContentError::Render {
        name: name.to_string(),
        source,
    })?;

    Ok(IncludeFragment {
        name: name.to_string(),
        markdown,
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(includes: &[&str]) -> BuildConfig {
        let yaml = format!("includes: [{}]", includes.join(", "));
        BuildConfig::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn preserves_manifest_order() {
        let temp = tempdir().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::write(
                fragment_path(temp.path(), name),
                format!("# {}\n", name.to_uppercase()),
            )
            .unwrap();
        }

        let fragments = assemble(&config(&["zeta", "alpha", "mid"]), temp.path()).unwrap();

        let names: Vec<_> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(fragments[0].html.contains("id=\"ZETA\""));
        assert!(fragments[2].html.contains("id=\"MID\""));
    }

    #[test]
    fn repeated_names_render_repeatedly() {
        let temp = tempdir().unwrap();
        fs::write(fragment_path(temp.path(), "intro"), "hello").unwrap();

        let fragments = assemble(&config(&["intro", "intro"]), temp.path()).unwrap();

        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn missing_include_aborts_assembly() {
        let temp = tempdir().unwrap();
        fs::write(fragment_path(temp.path(), "intro"), "# Intro").unwrap();

        let result = assemble(&config(&["intro", "ghost"]), temp.path());

        match result {
            Err(ContentError::IncludeNotFound { name, path }) => {
                assert_eq!(name, "ghost");
                assert!(path.ends_with("ghost.md"));
            }
            other => panic!("Expected IncludeNotFound, got {:?}", other),
        }
    }

    #[test]
    fn empty_includes_yield_no_fragments() {
        let temp = tempdir().unwrap();

        let fragments = assemble(&config(&[]), temp.path()).unwrap();

        assert!(fragments.is_empty());
    }
}
