//! Checks over the built output.
//!
//! Not a build prerequisite. Duplicate ids are deliberately not reported:
//! headings with the same text share an anchor.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::assets::AssetPipeline;
use crate::builder::BuildError;
use crate::layout::SiteLayout;

static IMG_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid img pattern"));
static ALT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\salt\s*=").expect("valid alt pattern"));
static PAIRED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)(div|section|article|aside|nav|ul|ol|table|pre|p|h[1-6])\b[^>]*>")
        .expect("valid tag pattern")
});

/// One problem found by the linter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintProblem {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for LintProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Lints the HTML pages and script bundle of an output tree.
pub struct Linter<'a> {
    layout: &'a SiteLayout,
}

impl<'a> Linter<'a> {
    pub fn new(layout: &'a SiteLayout) -> Self {
        Self { layout }
    }

    /// Lint everything, logging each problem as a warning.
    pub fn run(&self) -> Result<Vec<LintProblem>, BuildError> {
        let mut problems = Vec::new();

        let out = &self.layout.output_dir;
        if out.is_dir() {
            for entry in fs::read_dir(out).map_err(|e| BuildError::io(out, e))? {
                let path = entry.map_err(|e| BuildError::io(out, e))?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("html") {
                    let html = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
                    problems.extend(
                        lint_html(&html)
                            .into_iter()
                            .map(|message| LintProblem { path: path.clone(), message }),
                    );
                }
            }
        }

        let bundle = self.layout.script_bundle();
        if bundle.is_file() {
            let js = fs::read_to_string(&bundle).map_err(|e| BuildError::io(&bundle, e))?;
            problems.extend(
                AssetPipeline::script_errors(&js)
                    .into_iter()
                    .map(|message| LintProblem { path: bundle.clone(), message }),
            );
        }

        for problem in &problems {
            tracing::warn!("{}", problem);
        }
        Ok(problems)
    }
}

/// Problems in one HTML document.
pub fn lint_html(html: &str) -> Vec<String> {
    let mut problems = Vec::new();

    for img in IMG_TAG.find_iter(html) {
        if !ALT_ATTR.is_match(img.as_str()) {
            problems.push(format!("<img> without alt: {}", img.as_str()));
        }
    }

    let mut open: Vec<String> = Vec::new();
    for cap in PAIRED_TAG.captures_iter(html) {
        let closing = &cap[1] == "/";
        let tag = cap[2].to_lowercase();

        if !closing {
            open.push(tag);
            continue;
        }

        match open.iter().rposition(|t| *t == tag) {
            Some(pos) => {
                for unclosed in open.drain(pos..).skip(1) {
                    problems.push(format!("<{}> is never closed", unclosed));
                }
            }
            None => problems.push(format!("</{}> has no opening tag", tag)),
        }
    }
    for unclosed in open {
        problems.push(format!("<{}> is never closed", unclosed));
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_page() {
        let html = r#"<div><h1 id="A">A</h1><h1 id="A">A</h1><p>x<img alt="logo" src="l.png"></p></div>"#;

        assert!(lint_html(html).is_empty());
    }

    #[test]
    fn requires_alt_on_images() {
        let problems = lint_html(r#"<p><img src="logo.png"></p>"#);

        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("without alt"));
    }

    #[test]
    fn reports_unpaired_tags() {
        let problems = lint_html("<div><section></div></ul>");

        assert!(problems.iter().any(|p| p.contains("<section> is never closed")));
        assert!(problems.iter().any(|p| p.contains("</ul> has no opening tag")));
    }

    #[test]
    fn lints_output_tree() {
        let temp = tempfile::tempdir().unwrap();
        let layout = SiteLayout {
            source_dir: temp.path().join("source"),
            output_dir: temp.path().join("build"),
            ..Default::default()
        };
        fs::create_dir_all(layout.output("javascripts")).unwrap();
        fs::write(layout.output("index.html"), "<div><img src=x></div>").unwrap();
        fs::write(layout.script_bundle(), "var ok = 1;").unwrap();

        let problems = Linter::new(&layout).run().unwrap();

        assert_eq!(problems.len(), 1);
        assert!(problems[0].path.ends_with("index.html"));
    }
}
