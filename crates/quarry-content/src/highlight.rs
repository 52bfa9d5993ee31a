//! Syntax highlighting for fenced code blocks and highlight theme stylesheets.

use std::path::Path;
use std::sync::LazyLock;

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::manifest::ConfigError;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Class style shared by highlighted code and theme stylesheets.
const CLASS_STYLE: ClassStyle = ClassStyle::Spaced;

/// Theme names accepted in the manifest that map onto bundled themes.
const THEME_ALIASES: &[(&str, &str)] = &[
    ("default", "InspiredGitHub"),
    ("github", "InspiredGitHub"),
    ("solarized-dark", "Solarized (dark)"),
    ("solarized-light", "Solarized (light)"),
    ("ocean-dark", "base16-ocean.dark"),
    ("ocean-light", "base16-ocean.light"),
    ("eighties", "base16-eighties.dark"),
    ("mocha", "base16-mocha.dark"),
];

/// Code highlighted into HTML spans.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlighted {
    /// Language name echoed into the wrapper class (empty when auto-detected)
    pub language: String,

    /// Highlighted HTML
    pub html: String,
}

/// Highlight `code` using the syntax named by `language`, or auto-detect it
/// when no language is given.
pub fn highlight(code: &str, language: Option<&str>) -> Result<Highlighted, syntect::Error> {
    let (syntax, echoed) = match language.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => (syntax_for_token(lang), lang.to_string()),
        None => (detect_syntax(code), String::new()),
    };

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        generator.parse_html_for_line_which_includes_newline(line)?;
    }

    Ok(Highlighted {
        language: echoed,
        html: generator.finalize(),
    })
}

fn syntax_for_token(lang: &str) -> &'static SyntaxReference {
    SYNTAX_SET
        .find_syntax_by_token(lang)
        .or_else(|| SYNTAX_SET.find_syntax_by_token(&lang.to_lowercase()))
        .unwrap_or_else(|| {
            tracing::warn!("No syntax for code fence language '{}', using plain text", lang);
            SYNTAX_SET.find_syntax_plain_text()
        })
}

fn detect_syntax(code: &str) -> &'static SyntaxReference {
    code.lines()
        .find(|l| !l.trim().is_empty())
        .and_then(|first| SYNTAX_SET.find_syntax_by_first_line(first))
        .or_else(|| {
            looks_like_json(code)
                .then(|| SYNTAX_SET.find_syntax_by_token("json"))
                .flatten()
        })
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

fn looks_like_json(code: &str) -> bool {
    let trimmed = code.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Resolve a theme name to a theme.
///
/// Looks in `themes_dir` for `<name>.tmTheme` first, then in the bundled set
/// (by alias, exact name, or case-insensitive name). Names must not contain
/// path separators or `..`.
pub fn resolve_theme(name: &str, themes_dir: Option<&Path>) -> Result<Theme, ConfigError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(ConfigError::UnknownTheme(name.to_string()));
    }

    if let Some(dir) = themes_dir {
        let path = dir.join(format!("{}.tmTheme", name));
        if path.is_file() {
            return ThemeSet::get_theme(&path)
                .map_err(|e| ConfigError::UnknownTheme(format!("{}: {}", path.display(), e)));
        }
    }

    let wanted = THEME_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, bundled)| *bundled)
        .unwrap_or(name);

    THEME_SET
        .themes
        .get(wanted)
        .or_else(|| {
            THEME_SET
                .themes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .map(|(_, theme)| theme)
        })
        .cloned()
        .ok_or_else(|| ConfigError::UnknownTheme(name.to_string()))
}

/// Generate the stylesheet for a theme, matching the classes `highlight` emits.
pub fn theme_css(theme: &Theme) -> Result<String, syntect::Error> {
    css_for_theme_with_class_style(theme, CLASS_STYLE)
}
