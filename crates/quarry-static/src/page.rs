//! Page rendering: manifest data, fragments and helper functions merged into
//! the site's HTML templates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::{context, Environment, Value};
use quarry_content::{BuildConfig, IncludeFragment};

/// Immutable input to a page render.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Manifest, exposed as `current_page.data`
    pub config: BuildConfig,

    /// Rendered fragments, in manifest order
    pub fragments: Vec<IncludeFragment>,

    /// Language tab identifiers, exposed as `langs`
    pub langs: Vec<String>,
}

impl PageContext {
    pub fn new(config: BuildConfig, fragments: Vec<IncludeFragment>) -> Self {
        let langs = config.language_tab_list();
        Self {
            config,
            fragments,
            langs,
        }
    }
}

/// `<img>` tag for a file under `images/`; `alt` and the class derive from
/// the part of the name before the first dot.
pub fn image_tag(filename: &str) -> String {
    let code = filename.split('.').next().unwrap_or(filename);
    format!(
        "<img alt=\"{code}\" class=\"image-{code}\" src=\"images/{}\">",
        filename
    )
}

/// `<script>` tag for `javascripts/{name}.js`.
pub fn javascript_include_tag(name: &str) -> String {
    format!(
        "<script src=\"javascripts/{}.js\" type=\"text/javascript\"></script>\n",
        name
    )
}

/// Stylesheet `<link>` for `stylesheets/{name}.css`, scoped to `media`.
pub fn stylesheet_link_tag(name: &str, media: &str) -> String {
    format!(
        "<link href=\"stylesheets/{}.css\" rel=\"stylesheet\" media=\"{}\">",
        name, media
    )
}

/// Template renderer with the page helpers registered.
pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_function("image_tag", |filename: String| {
            Value::from_safe_string(image_tag(&filename))
        });
        env.add_function("javascript_include_tag", |name: String| {
            Value::from_safe_string(javascript_include_tag(&name))
        });
        env.add_function(
            "stylesheet_link_tag",
            |name: String, media: Option<String>| {
                Value::from_safe_string(stylesheet_link_tag(
                    &name,
                    media.as_deref().unwrap_or("all"),
                ))
            },
        );

        Self { env }
    }

    /// Render one template. `name` decides auto-escaping (`.html` escapes).
    pub fn render(
        &self,
        name: &str,
        source: &str,
        page: &PageContext,
    ) -> Result<String, minijinja::Error> {
        let includes: Vec<Value> = page
            .fragments
            .iter()
            .map(|f| Value::from_safe_string(f.html.clone()))
            .collect();

        let tmpl = self.env.template_from_named_str(name, source)?;

        tmpl.render(context! {
            current_page => context! { data => Value::from_serialize(&page.config) },
            page_classes => "",
            includes => includes,
            langs => &page.langs,
        })
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Page templates at the top level of `source_dir`, sorted by name.
pub fn discover_templates(source_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut templates = Vec::new();

    for entry in fs::read_dir(source_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("html") {
            templates.push(path);
        }
    }

    templates.sort();
    Ok(templates)
}
