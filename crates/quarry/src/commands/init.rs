//! Scaffold a documentation site.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("quarry.toml", DEFAULT_CONFIG),
    ("source/index.yml", DEFAULT_MANIFEST),
    ("source/index.html", DEFAULT_TEMPLATE),
    ("source/includes/intro.md", DEFAULT_INTRO),
    ("source/stylesheets/screen.css.scss", DEFAULT_STYLESHEET),
    ("source/javascripts/app/_lang.js", DEFAULT_LANG_SCRIPT),
    ("source/javascripts/app/_toc.js", DEFAULT_TOC_SCRIPT),
];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing quarry...");

    let root = Path::new(".");
    if root.join("source").exists() && !yes {
        tracing::warn!("source/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    let written = scaffold(root, yes)?;
    for path in &written {
        tracing::info!("Created {}", path.display());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'quarry serve' to start the development server.");

    Ok(())
}

/// Write the scaffold under `root`. Existing files are kept unless
/// `overwrite` is set. Returns the files written.
pub fn scaffold(root: &Path, overwrite: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for (relative, contents) in SCAFFOLD {
        let path = root.join(relative);
        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", path.display());
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(PathBuf::from(relative));
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# Quarry Configuration

[source]
# Source directory (templates, manifest, includes, assets)
dir = "source"

# Manifest, relative to the source directory
manifest = "index.yml"

# Markdown fragments, relative to the source directory
includes = "includes"

[build]
# Output directory for the built site
dir = "build"

# Minify scripts and stylesheets
compress = true

[server]
host = "127.0.0.1"
port = 4567
open = true
debounce_ms = 150

[assets]
# Scripts bundled into javascripts/all.js, in order
libs = []
search = []
scripts = [
    "javascripts/app/_lang.js",
    "javascripts/app/_toc.js",
]
"#;

const DEFAULT_MANIFEST: &str = r#"title: API Reference

language_tabs:
  - bash: Shell
  - json

includes:
  - intro

highlight_theme: default

search: false
"#;

const DEFAULT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ current_page.data.title }}</title>
  {{ stylesheet_link_tag("screen", "screen") }}
  {{ stylesheet_link_tag("highlight-" ~ current_page.data.highlight_theme) }}
</head>
<body class="index {{ page_classes }}" data-languages="{{ langs | join(",") }}">
  <nav class="toc-wrapper">
    <div class="lang-selector">
      {% for lang in langs %}<a href="#" data-language-name="{{ lang }}">{{ lang }}</a>{% endfor %}
    </div>
    <div id="toc"></div>
  </nav>
  <div class="page-wrapper">
    <div class="content">
      {% for include in includes %}{{ include }}{% endfor %}
    </div>
  </div>
  {{ javascript_include_tag("all") }}
</body>
</html>
"##;

const DEFAULT_INTRO: &str = r#"# Introduction

Welcome to the API reference. Each section pairs a description with
examples in every language listed in `index.yml`.

# Authentication

Send your key with every request:

```bash
curl "https://api.example.com/status" \
  -H "Authorization: Bearer $API_KEY"
```

A successful call returns:

```json
{
  "status": "ok"
}
```
"#;

const DEFAULT_STYLESHEET: &str = r#"$sidebar-width: 230px;
$nav-bg: #2e3336;
$main-bg: #f3f7f9;
$code-bg: #292929;

body {
  margin: 0;
  background: $main-bg;
  font-family: "Helvetica Neue", Helvetica, Arial, sans-serif;
}

.toc-wrapper {
  position: fixed;
  top: 0;
  bottom: 0;
  left: 0;
  width: $sidebar-width;
  overflow-y: auto;
  background: $nav-bg;
  color: #fff;

  a {
    color: #fff;
    text-decoration: none;
  }

  .active {
    font-weight: bold;
  }
}

.page-wrapper {
  margin-left: $sidebar-width;
  padding: 0 28px;
}

pre.highlight {
  padding: 1em;
  overflow-x: auto;
}
"#;

const DEFAULT_LANG_SCRIPT: &str = r#"(function (global) {
  'use strict';

  function activateLanguage(language) {
    var links = document.querySelectorAll('.lang-selector a');
    for (var i = 0; i < links.length; i++) {
      var name = links[i].getAttribute('data-language-name');
      links[i].classList.toggle('active', name === language);
    }

    var blocks = document.querySelectorAll('pre.highlight');
    for (var j = 0; j < blocks.length; j++) {
      var shown = blocks[j].classList.contains(language) || blocks[j].classList.length === 1;
      blocks[j].style.display = shown ? '' : 'none';
    }
  }

  function setupLanguages() {
    var languages = (document.body.getAttribute('data-languages') || '').split(',');
    var language = global.location.search.substr(1) || languages[0];
    if (language) {
      activateLanguage(language);
    }

    var links = document.querySelectorAll('.lang-selector a');
    for (var i = 0; i < links.length; i++) {
      links[i].addEventListener('click', function (event) {
        event.preventDefault();
        activateLanguage(this.getAttribute('data-language-name'));
      });
    }
  }

  global.addEventListener('DOMContentLoaded', setupLanguages);
})(window);
"#;

const DEFAULT_TOC_SCRIPT: &str = r#"(function (global) {
  'use strict';

  function buildToc() {
    var toc = document.getElementById('toc');
    if (!toc) {
      return;
    }

    var headings = document.querySelectorAll('.content h1, .content h2');
    var list = document.createElement('ul');
    for (var i = 0; i < headings.length; i++) {
      var item = document.createElement('li');
      var link = document.createElement('a');
      link.href = '#' + headings[i].id;
      link.textContent = headings[i].textContent;
      item.className = 'toc-' + headings[i].tagName.toLowerCase();
      item.appendChild(link);
      list.appendChild(item);
    }
    toc.appendChild(list);
  }

  global.addEventListener('DOMContentLoaded', buildToc);
})(window);
"#;
