//! Verbatim copy of font and image trees.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::builder::BuildError;
use crate::layout::SiteLayout;

/// Static subtree copied as-is into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticKind {
    Fonts,
    Images,
}

impl StaticKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Fonts => "fonts",
            Self::Images => "images",
        }
    }
}

/// Copies `source/<kind>/**` to `build/<kind>/**`.
pub struct StaticCopier<'a> {
    layout: &'a SiteLayout,
}

impl<'a> StaticCopier<'a> {
    pub fn new(layout: &'a SiteLayout) -> Self {
        Self { layout }
    }

    /// Copy every file of the subtree, keeping relative paths and bytes.
    /// Returns the number of files copied; a missing subtree copies nothing.
    pub fn copy(&self, kind: StaticKind) -> Result<usize, BuildError> {
        let from = self.layout.source(kind.dir_name());
        let to = self.layout.output(kind.dir_name());

        if !from.exists() {
            tracing::info!("No {} to copy at {}", kind.dir_name(), from.display());
            return Ok(0);
        }

        copy_tree(&from, &to)
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<usize, BuildError> {
    let mut files: Vec<(PathBuf, PathBuf)> = Vec::new();

    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| BuildError::walk(from, e))?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| BuildError::io(&target, e))?;
        } else {
            files.push((entry.path().to_path_buf(), target));
        }
    }

    files
        .par_iter()
        .map(|(src, dst)| {
            fs::copy(src, dst)
                .map(|_| ())
                .map_err(|e| BuildError::io(src, e))
        })
        .collect::<Result<Vec<()>, BuildError>>()?;

    Ok(files.len())
}
