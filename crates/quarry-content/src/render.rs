//! Markdown to HTML rendering with the site's heading and code block rules.

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::highlight::highlight;

/// Errors that can occur while rendering a fragment.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to highlight {language} code block: {message}")]
    Highlight { language: String, message: String },
}

/// Render Markdown to HTML.
///
/// Headings get an `id` equal to their percent-encoded text, unmodified:
/// duplicate headings produce duplicate ids. Fenced code is highlighted and
/// wrapped as `<pre class="highlight {lang}"><code>..</code></pre>`.
pub fn render_markdown(source: &str) -> Result<String, RenderError> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut events: Vec<Event> = Vec::new();

    let mut heading: Option<(u8, String, Vec<Event>)> = None; // (level, text, inner)
    let mut code: Option<(Option<String>, String)> = None; // (language, source)

    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, String::new(), Vec::new()));
            }

            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text, inner)) = heading.take() {
                    events.push(Event::Html(heading_html(level, &text, inner).into()));
                }
            }

            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                code = Some((language, String::new()));
            }

            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, source)) = code.take() {
                    events.push(Event::Html(code_html(language.as_deref(), &source)?.into()));
                }
            }

            Event::Text(text) if code.is_some() => {
                if let Some((_, ref mut source)) = code {
                    source.push_str(&text);
                }
            }

            other => match heading {
                Some((_, ref mut text, ref mut inner)) => {
                    match other {
                        Event::Text(ref t) | Event::Code(ref t) => text.push_str(t),
                        Event::SoftBreak | Event::HardBreak => text.push('\n'),
                        _ => {}
                    }
                    inner.push(other);
                }
                None => events.push(other),
            },
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());

    Ok(html_output)
}

fn heading_html(level: u8, text: &str, inner: Vec<Event>) -> String {
    let mut inner_html = String::new();
    html::push_html(&mut inner_html, inner.into_iter());

    format!(
        "<h{level} id=\"{}\">{}</h{level}>\n",
        urlencoding::encode(text),
        inner_html
    )
}

fn code_html(language: Option<&str>, source: &str) -> Result<String, RenderError> {
    let highlighted = highlight(source, language).map_err(|e| RenderError::Highlight {
        language: language.unwrap_or("auto-detected").to_string(),
        message: e.to_string(),
    })?;

    Ok(format!(
        "<pre class=\"highlight {}\"><code>{}</code></pre>\n",
        highlighted.language, highlighted.html
    ))
}
