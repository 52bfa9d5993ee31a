//! Asset pipeline: script bundle, compiled stylesheets and the highlight theme.

use std::fs;
use std::path::{Path, PathBuf};

use quarry_content::highlight::{resolve_theme, theme_css};
use quarry_content::BuildConfig;

use crate::builder::{BuildError, BuildOptions};
use crate::layout::SiteLayout;

/// File name prefix of the highlight theme stylesheet. Stylesheet sources
/// with this prefix are not compiled.
pub const HIGHLIGHT_PREFIX: &str = "highlight-";

/// Builds the script, stylesheet and theme outputs for a site.
pub struct AssetPipeline<'a> {
    layout: &'a SiteLayout,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(layout: &'a SiteLayout) -> Self {
        Self { layout }
    }

    /// Concatenate libraries, search scripts (when `config.search` is set) and
    /// application scripts into `javascripts/all.js`.
    pub fn build_scripts(
        &self,
        config: &BuildConfig,
        options: &BuildOptions,
    ) -> Result<PathBuf, BuildError> {
        let files = self.layout.assets.bundle_order(config.search);

        let mut bundle = String::new();
        for file in &files {
            let path = self.layout.source(file);
            let source = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            bundle.push_str(&source);
            if !source.ends_with('\n') {
                bundle.push('\n');
            }
        }

        let output = self.layout.script_bundle();
        let bundle = if options.compress {
            Self::minify_js(&bundle).map_err(|message| BuildError::AssetCompile {
                path: output.clone(),
                message,
            })?
        } else {
            bundle
        };

        write_output(&output, bundle.as_bytes())?;
        tracing::debug!("Bundled {} scripts into {}", files.len(), output.display());

        Ok(output)
    }

    /// Compile every stylesheet source to `stylesheets/<name>.css`.
    ///
    /// A file that fails to compile is reported and skipped; the others are
    /// still written. The first failure is returned once all files are done.
    pub fn build_styles(&self, options: &BuildOptions) -> Result<Vec<PathBuf>, BuildError> {
        let source_dir = self.layout.source("stylesheets");
        let output_dir = self.layout.output("stylesheets");

        let mut written = Vec::new();
        let mut failures = Vec::new();

        for source in stylesheet_sources(&source_dir)? {
            let Some(name) = output_name(&source) else {
                continue;
            };
            if name.starts_with(HIGHLIGHT_PREFIX) {
                tracing::warn!(
                    "Skipping {}: '{}' names are reserved for the highlight theme",
                    source.display(),
                    HIGHLIGHT_PREFIX
                );
                continue;
            }
            let output = output_dir.join(name);

            match self.compile_stylesheet(&source, &source_dir, options) {
                Ok(css) => {
                    write_output(&output, css.as_bytes())?;
                    written.push(output);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    failures.push(e);
                }
            }
        }

        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(written),
        }
    }

    fn compile_stylesheet(
        &self,
        source: &Path,
        load_path: &Path,
        options: &BuildOptions,
    ) -> Result<String, BuildError> {
        let grass_options = grass::Options::default().load_path(load_path);

        let css = grass::from_path(source, &grass_options).map_err(|e| {
            BuildError::AssetCompile {
                path: source.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        if options.compress {
            Self::minify_css(&css).map_err(|message| BuildError::AssetCompile {
                path: source.to_path_buf(),
                message,
            })
        } else {
            Ok(css)
        }
    }

    /// Write the stylesheet for the manifest's `highlight_theme` to
    /// `stylesheets/highlight-<theme>.css`.
    pub fn build_highlight_theme(
        &self,
        config: &BuildConfig,
        options: &BuildOptions,
    ) -> Result<PathBuf, BuildError> {
        let name = config.require_highlight_theme()?;
        let theme = resolve_theme(name, Some(&self.layout.themes_dir()))?;

        let output = self
            .layout
            .output("stylesheets")
            .join(format!("{}{}.css", HIGHLIGHT_PREFIX, name));

        let css = theme_css(&theme).map_err(|e| BuildError::AssetCompile {
            path: output.clone(),
            message: e.to_string(),
        })?;

        let css = if options.compress {
            Self::minify_css(&css).map_err(|message| BuildError::AssetCompile {
                path: output.clone(),
                message,
            })?
        } else {
            css
        };

        write_output(&output, css.as_bytes())?;
        Ok(output)
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

        let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Minify JavaScript by parsing with oxc and printing without whitespace.
    pub fn minify_js(js: &str) -> Result<String, String> {
        use oxc_allocator::Allocator;
        use oxc_codegen::{Codegen, CodegenOptions};
        use oxc_parser::Parser;
        use oxc_span::SourceType;

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, js, SourceType::cjs()).parse();

        if parsed.panicked || !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            return Err(format!("JS parse error: {}", messages.join("; ")));
        }

        let printed = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                ..CodegenOptions::default()
            })
            .build(&parsed.program);

        Ok(printed.code)
    }

    /// Syntax errors in a script, empty when it parses.
    pub fn script_errors(js: &str) -> Vec<String> {
        use oxc_allocator::Allocator;
        use oxc_parser::Parser;
        use oxc_span::SourceType;

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, js, SourceType::cjs()).parse();

        parsed.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Stylesheet sources directly inside `dir`, sorted. Partials (`_name.scss`)
/// are only reachable through `@import`.
fn stylesheet_sources(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !dir.is_dir() {
        tracing::warn!("No stylesheet directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| BuildError::walk(dir, e))?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        if entry.file_type().is_file()
            && file_name.ends_with(".scss")
            && !file_name.starts_with('_')
        {
            sources.push(path.to_path_buf());
        }
    }

    Ok(sources)
}

/// `screen.css.scss` and `screen.scss` both become `screen.css`.
fn output_name(source: &Path) -> Option<String> {
    let file_name = source.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".scss")?;

    if stem.ends_with(".css") {
        Some(stem.to_string())
    } else {
        Some(format!("{}.css", stem))
    }
}

pub(crate) fn write_output(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}
