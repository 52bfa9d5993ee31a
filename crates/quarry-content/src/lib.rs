//! Manifest loading and Markdown fragment rendering.
//!
//! Reads the site manifest, loads the Markdown includes it names in order,
//! and renders each one with anchor-bearing headings and highlighted code.

pub mod assemble;
pub mod highlight;
pub mod manifest;
pub mod render;

pub use assemble::{assemble, fragment_path, ContentError, IncludeFragment};
pub use manifest::{BuildConfig, ConfigError, LanguageTab};
pub use render::{render_markdown, RenderError};
