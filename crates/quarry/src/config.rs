//! Project configuration (`quarry.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use quarry_server::DevServerConfig;
use quarry_static::{AssetManifest, BuildOptions, SiteLayout};
use serde::Deserialize;

/// Configuration file structure (quarry.toml).
///
/// Relative paths are resolved against the directory holding the file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub assets: AssetSettings,

    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dir: PathBuf,
    pub manifest: PathBuf,
    pub includes: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let layout = SiteLayout::default();
        Self {
            dir: layout.source_dir,
            manifest: layout.manifest,
            includes: layout.includes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub dir: PathBuf,
    pub compress: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            dir: SiteLayout::default().output_dir,
            compress: BuildOptions::default().compress,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub open: bool,
    pub debounce_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let server = DevServerConfig::default();
        Self {
            host: server.host,
            port: server.port,
            open: server.open,
            debounce_ms: server.debounce.as_millis() as u64,
        }
    }
}

/// Script lists of the bundle, relative to the source directory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub libs: Vec<PathBuf>,
    pub search: Vec<PathBuf>,
    pub scripts: Vec<PathBuf>,
}

impl Default for AssetSettings {
    fn default() -> Self {
        let assets = AssetManifest::default();
        Self {
            libs: assets.libs,
            search: assets.search,
            scripts: assets.scripts,
        }
    }
}

impl ConfigFile {
    /// Load configuration from `path` if it exists.
    /// Returns an error if the config file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: ConfigFile = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            tracing::debug!("Loaded config from {}", path.display());
            config
        } else {
            tracing::debug!("No {}, using defaults", path.display());
            ConfigFile::default()
        };

        config.root = root;
        Ok(config)
    }

    pub fn layout(&self) -> SiteLayout {
        SiteLayout {
            source_dir: self.root.join(&self.source.dir),
            output_dir: self.root.join(&self.build.dir),
            manifest: self.source.manifest.clone(),
            includes: self.source.includes.clone(),
            assets: AssetManifest {
                libs: self.assets.libs.clone(),
                search: self.assets.search.clone(),
                scripts: self.assets.scripts.clone(),
            },
        }
    }

    /// Build options, with `--no-compress` overriding the file.
    pub fn options(&self, no_compress: bool) -> BuildOptions {
        BuildOptions {
            compress: self.build.compress && !no_compress,
        }
    }

    pub fn server(&self, port: Option<u16>, open: bool) -> DevServerConfig {
        DevServerConfig {
            layout: self.layout(),
            host: self.server.host.clone(),
            port: port.unwrap_or(self.server.port),
            open: open && self.server.open,
            debounce: Duration::from_millis(self.server.debounce_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = ConfigFile::load(&temp.path().join("quarry.toml")).unwrap();
        let layout = config.layout();

        assert_eq!(layout.source_dir, temp.path().join("source"));
        assert_eq!(layout.output_dir, temp.path().join("build"));
        assert_eq!(layout.manifest, PathBuf::from("index.yml"));
        assert_eq!(layout.assets, AssetManifest::default());
        assert!(config.options(false).compress);
        assert_eq!(config.server(None, true).port, 4567);
    }

    #[test]
    fn reads_sections() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("quarry.toml");
        fs::write(
            &path,
            r#"
[source]
dir = "docs"
includes = "parts"

[build]
dir = "public"
compress = false

[server]
port = 8080
debounce_ms = 40

[assets]
libs = []
scripts = ["javascripts/app/_toc.js"]
"#,
        )
        .unwrap();

        let config = ConfigFile::load(&path).unwrap();
        let layout = config.layout();

        assert_eq!(layout.source_dir, temp.path().join("docs"));
        assert_eq!(layout.includes_dir(), temp.path().join("docs/parts"));
        assert_eq!(layout.output_dir, temp.path().join("public"));
        assert!(layout.assets.libs.is_empty());
        assert_eq!(layout.assets.search, AssetManifest::default().search);
        assert!(!config.options(false).compress);

        let server = config.server(None, true);
        assert_eq!(server.port, 8080);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.debounce, Duration::from_millis(40));
    }

    #[test]
    fn flags_override_file() {
        let config = ConfigFile::default();

        assert!(!config.options(true).compress);
        assert_eq!(config.server(Some(9000), false).port, 9000);
        assert!(!config.server(Some(9000), false).open);
    }

    #[test]
    fn rejects_malformed_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("quarry.toml");
        fs::write(&path, "[server]\nport = \"high\"\n").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }
}
