//! Site builder: runs one task of the build against a layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use quarry_content::{assemble, manifest, BuildConfig, ConfigError, ContentError};

use crate::assets::{write_output, AssetPipeline};
use crate::copier::{StaticCopier, StaticKind};
use crate::layout::SiteLayout;
use crate::lint::Linter;
use crate::page::{discover_templates, PageContext, PageRenderer};
use crate::tasks::TaskId;

/// Per-run build options, passed to every task of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Minify scripts and stylesheets
    pub compress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

impl BuildOptions {
    pub fn uncompressed() -> Self {
        Self { compress: false }
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Manifest error: {0}")]
    Config(#[from] ConfigError),

    #[error("Include '{name}' not found at {}", path.display())]
    IncludeNotFound { name: String, path: PathBuf },

    #[error("Failed to render include: {0}")]
    Content(String),

    #[error("Failed to render template {}: {message}", path.display())]
    Template { path: PathBuf, message: String },

    #[error("Failed to compile {}: {message}", path.display())]
    AssetCompile { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Lint found {0} problem(s)")]
    Lint(usize),

    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl BuildError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn walk(root: &Path, err: walkdir::Error) -> Self {
        let path = err.path().unwrap_or(root).to_path_buf();
        Self::Io {
            path,
            source: err.into(),
        }
    }
}

impl From<ContentError> for BuildError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::IncludeNotFound { name, path } => Self::IncludeNotFound { name, path },
            ContentError::Read { path, source } => Self::Io { path, source },
            ContentError::Render { .. } => Self::Content(err.to_string()),
        }
    }
}

/// Executes individual build tasks.
#[derive(Debug, Clone)]
pub struct SiteBuilder {
    layout: SiteLayout,
}

impl SiteBuilder {
    pub fn new(layout: SiteLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Run one task to completion.
    pub fn run_task(&self, task: TaskId, options: &BuildOptions) -> Result<(), BuildError> {
        let start = Instant::now();
        tracing::info!("Starting '{}'", task.name());

        match task {
            TaskId::Clean => self.clean()?,
            TaskId::Fonts => {
                StaticCopier::new(&self.layout).copy(StaticKind::Fonts)?;
            }
            TaskId::Images => {
                StaticCopier::new(&self.layout).copy(StaticKind::Images)?;
            }
            TaskId::Scripts => {
                let config = self.read_manifest()?;
                AssetPipeline::new(&self.layout).build_scripts(&config, options)?;
            }
            TaskId::Styles => {
                AssetPipeline::new(&self.layout).build_styles(options)?;
            }
            TaskId::HighlightTheme => {
                let config = self.read_manifest()?;
                AssetPipeline::new(&self.layout).build_highlight_theme(&config, options)?;
            }
            TaskId::Html => {
                self.build_html()?;
            }
            TaskId::Lint => {
                let problems = Linter::new(&self.layout).run()?;
                if !problems.is_empty() {
                    return Err(BuildError::Lint(problems.len()));
                }
            }
        }

        tracing::info!(
            "Finished '{}' in {}ms",
            task.name(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// The manifest, re-read from disk on every call.
    pub fn read_manifest(&self) -> Result<BuildConfig, BuildError> {
        Ok(manifest::read(&self.layout.manifest_path())?)
    }

    /// Remove everything under the output directory.
    pub fn clean(&self) -> Result<(), BuildError> {
        let out = &self.layout.output_dir;
        if out.exists() {
            fs::remove_dir_all(out).map_err(|e| BuildError::io(out, e))?;
        }
        fs::create_dir_all(out).map_err(|e| BuildError::io(out, e))
    }

    /// Render every page template.
    ///
    /// Fragments are assembled and every template rendered before anything is
    /// written, so a missing include or a broken template leaves no output.
    pub fn build_html(&self) -> Result<Vec<PathBuf>, BuildError> {
        let config = self.read_manifest()?;
        let fragments = assemble(&config, &self.layout.includes_dir())?;
        let page = PageContext::new(config, fragments);

        let renderer = PageRenderer::new();
        let templates = discover_templates(&self.layout.source_dir)
            .map_err(|e| BuildError::io(&self.layout.source_dir, e))?;

        let mut rendered = Vec::with_capacity(templates.len());
        for template in &templates {
            let source =
                fs::read_to_string(template).map_err(|e| BuildError::io(template, e))?;
            let name = template
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("index.html");

            let html = renderer
                .render(name, &source, &page)
                .map_err(|e| BuildError::Template {
                    path: template.clone(),
                    message: e.to_string(),
                })?;

            rendered.push((self.layout.output(name), html));
        }

        let mut written = Vec::with_capacity(rendered.len());
        for (path, html) in rendered {
            write_output(&path, html.as_bytes())?;
            written.push(path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn site(root: &Path, manifest: &str, includes: &[(&str, &str)]) -> SiteBuilder {
        let layout = SiteLayout {
            source_dir: root.join("source"),
            output_dir: root.join("build"),
            ..Default::default()
        };

        fs::create_dir_all(layout.includes_dir()).unwrap();
        fs::write(layout.manifest_path(), manifest).unwrap();
        fs::write(
            layout.source("index.html"),
            "<html><body>{% for include in includes %}{{ include }}{% endfor %}</body></html>",
        )
        .unwrap();
        for (name, markdown) in includes {
            fs::write(quarry_content::fragment_path(&layout.includes_dir(), name), markdown)
                .unwrap();
        }

        SiteBuilder::new(layout)
    }

    #[test]
    fn renders_fragments_in_manifest_order() {
        let temp = tempdir().unwrap();
        let builder = site(
            temp.path(),
            "includes: [intro, auth]",
            &[("auth", "# Authentication\n"), ("intro", "# Introduction\n")],
        );

        builder.run_task(TaskId::Html, &BuildOptions::default()).unwrap();

        let html = fs::read_to_string(builder.layout().output("index.html")).unwrap();
        let intro = html.find("id=\"Introduction\"").unwrap();
        let auth = html.find("id=\"Authentication\"").unwrap();
        assert!(intro < auth);
    }

    #[test]
    fn missing_include_fails_without_writing() {
        let temp = tempdir().unwrap();
        let builder = site(temp.path(), "includes: [intro, ghost]", &[("intro", "# Hi")]);

        let result = builder.run_task(TaskId::Html, &BuildOptions::default());

        assert!(matches!(result, Err(BuildError::IncludeNotFound { ref name, .. }) if name == "ghost"));
        assert!(!builder.layout().output("index.html").exists());
    }

    #[test]
    fn broken_template_is_a_template_error() {
        let temp = tempdir().unwrap();
        let builder = site(temp.path(), "includes: []", &[]);
        fs::write(builder.layout().source("index.html"), "{% if %}").unwrap();

        let result = builder.run_task(TaskId::Html, &BuildOptions::default());

        assert!(matches!(result, Err(BuildError::Template { .. })));
    }

    #[test]
    fn manifest_edits_are_picked_up() {
        let temp = tempdir().unwrap();
        let builder = site(
            temp.path(),
            "includes: [a]",
            &[("a", "# First"), ("b", "# Second")],
        );
        let out = builder.layout().output("index.html");

        builder.build_html().unwrap();
        assert!(!fs::read_to_string(&out).unwrap().contains("Second"));

        fs::write(builder.layout().manifest_path(), "includes: [a, b]").unwrap();
        builder.build_html().unwrap();
        assert!(fs::read_to_string(&out).unwrap().contains("Second"));
    }

    #[test]
    fn clean_empties_output() {
        let temp = tempdir().unwrap();
        let builder = site(temp.path(), "includes: []", &[]);
        let stale = builder.layout().output("stale/file.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        builder.run_task(TaskId::Clean, &BuildOptions::default()).unwrap();

        assert!(builder.layout().output_dir.is_dir());
        assert!(!stale.exists());
    }

    #[test]
    fn invalid_manifest_is_a_config_error() {
        let temp = tempdir().unwrap();
        let builder = site(temp.path(), "title: no includes", &[]);

        let result = builder.run_task(TaskId::Html, &BuildOptions::default());

        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::MissingIncludes))
        ));
    }
}
