//! Source and output tree layout.

use std::path::{Path, PathBuf};

/// Ordered script lists that make up the bundle.
///
/// Fixed once the process starts; only whether `search` is spliced in is
/// decided per build, from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    /// Library scripts, always first
    pub libs: Vec<PathBuf>,

    /// Search feature scripts, only when the manifest enables search
    pub search: Vec<PathBuf>,

    /// Application scripts, always last
    pub scripts: Vec<PathBuf>,
}

impl AssetManifest {
    /// Files to concatenate, in bundle order.
    pub fn bundle_order(&self, search: bool) -> Vec<&Path> {
        let search_files: &[PathBuf] = if search { &self.search } else { &[] };

        self.libs
            .iter()
            .chain(search_files)
            .chain(&self.scripts)
            .map(PathBuf::as_path)
            .collect()
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        let paths = |list: &[&str]| -> Vec<PathBuf> { list.iter().map(PathBuf::from).collect() };

        Self {
            libs: paths(&[
                "javascripts/lib/_energize.js",
                "javascripts/lib/_jquery.js",
                "javascripts/lib/_jquery_ui.js",
                "javascripts/lib/_jquery.tocify.js",
                "javascripts/lib/_imagesloaded.min.js",
            ]),
            search: paths(&[
                "javascripts/lib/_lunr.js",
                "javascripts/lib/_jquery.highlight.js",
                "javascripts/app/_search.js",
            ]),
            scripts: paths(&["javascripts/app/_lang.js", "javascripts/app/_toc.js"]),
        }
    }
}

/// Where sources live and where output goes.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    /// Source root (templates, manifest, includes, assets)
    pub source_dir: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Manifest file name, relative to `source_dir`
    pub manifest: PathBuf,

    /// Fragment directory, relative to `source_dir`
    pub includes: PathBuf,

    /// Script bundle composition, relative to `source_dir`
    pub assets: AssetManifest,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            output_dir: PathBuf::from("build"),
            manifest: PathBuf::from("index.yml"),
            includes: PathBuf::from("includes"),
            assets: AssetManifest::default(),
        }
    }
}

/// Name of the script bundle inside `javascripts/`.
pub const SCRIPT_BUNDLE: &str = "all.js";

impl SiteLayout {
    pub fn manifest_path(&self) -> PathBuf {
        self.source_dir.join(&self.manifest)
    }

    pub fn includes_dir(&self) -> PathBuf {
        self.source_dir.join(&self.includes)
    }

    pub fn source(&self, sub: impl AsRef<Path>) -> PathBuf {
        self.source_dir.join(sub)
    }

    pub fn output(&self, sub: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(sub)
    }

    /// Directory of user supplied `.tmTheme` files.
    pub fn themes_dir(&self) -> PathBuf {
        self.source_dir.join("themes")
    }

    pub fn script_bundle(&self) -> PathBuf {
        self.output("javascripts").join(SCRIPT_BUNDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_excludes_search_when_disabled() {
        let manifest = AssetManifest::default();

        let order = manifest.bundle_order(false);

        assert_eq!(order.len(), manifest.libs.len() + manifest.scripts.len());
        assert_eq!(order[0], manifest.libs[0].as_path());
        assert_eq!(order.last().copied(), manifest.scripts.last().map(PathBuf::as_path));
        assert!(!order.iter().any(|p| p.ends_with("_lunr.js")));
    }

    #[test]
    fn bundle_splices_search_between_libs_and_scripts() {
        let manifest = AssetManifest {
            libs: vec!["a.js".into(), "b.js".into()],
            search: vec!["s.js".into()],
            scripts: vec!["app.js".into()],
        };

        let order: Vec<_> = manifest
            .bundle_order(true)
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();

        assert_eq!(order, vec!["a.js", "b.js", "s.js", "app.js"]);
    }

    #[test]
    fn resolves_paths_against_roots() {
        let layout = SiteLayout::default();

        assert_eq!(layout.manifest_path(), PathBuf::from("source/index.yml"));
        assert_eq!(layout.includes_dir(), PathBuf::from("source/includes"));
        assert_eq!(layout.script_bundle(), PathBuf::from("build/javascripts/all.js"));
    }
}
