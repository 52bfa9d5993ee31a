//! Mapping source changes to rebuilds.
//!
//! Watch events go into one queue. The dispatcher waits for the queue to
//! stay quiet for the debounce window, unions the tasks of every event it
//! saw, and runs a single uncompressed rebuild. Rebuilds never overlap:
//! events that arrive mid-build are picked up by the next batch.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use quarry_static::{BuildOptions, Orchestrator, SiteLayout, TaskId};
use regex::Regex;
use tokio::sync::mpsc;

use crate::watcher::WatchEvent;

/// One watch rule: source paths matching `pattern` rerun `tasks`.
#[derive(Debug, Clone)]
pub struct WatchRule {
    pattern: Regex,
    tasks: BTreeSet<TaskId>,
}

impl WatchRule {
    /// `pattern` is matched against the `/`-separated path relative to the
    /// source root.
    pub fn new(
        pattern: &str,
        tasks: impl IntoIterator<Item = TaskId>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            tasks: tasks.into_iter().collect(),
        })
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.pattern.is_match(relative)
    }
}

/// Declarative table of watch rules.
#[derive(Debug, Clone)]
pub struct WatchTable {
    source_dir: PathBuf,
    rules: Vec<WatchRule>,
}

impl WatchTable {
    pub fn new(source_dir: impl Into<PathBuf>, rules: Vec<WatchRule>) -> Self {
        Self {
            source_dir: source_dir.into(),
            rules,
        }
    }

    /// The rules of the dev server:
    ///
    /// | source                 | tasks                          |
    /// |------------------------|--------------------------------|
    /// | `*.html` at the root   | html                           |
    /// | fragment directory     | html                           |
    /// | `javascripts/`         | full build                     |
    /// | `stylesheets/`         | styles                         |
    /// | manifest               | full build                     |
    pub fn standard(layout: &SiteLayout) -> Result<Self, regex::Error> {
        let includes = format!("^{}/", regex::escape(&slash_path(&layout.includes)));
        let manifest = format!("^{}$", regex::escape(&slash_path(&layout.manifest)));

        let rules = vec![
            WatchRule::new(r"^[^/]+\.html$", [TaskId::Html])?,
            WatchRule::new(&includes, [TaskId::Html])?,
            WatchRule::new("^javascripts/", TaskId::BUILD)?,
            WatchRule::new("^stylesheets/", [TaskId::Styles])?,
            WatchRule::new(
                &manifest,
                TaskId::BUILD
                    .into_iter()
                    .chain([TaskId::HighlightTheme, TaskId::Html]),
            )?,
        ];

        Ok(Self::new(&layout.source_dir, rules))
    }

    /// Tasks to rerun when `path` changes. Empty for paths outside the
    /// source root or matching no rule.
    pub fn tasks_for(&self, path: &Path) -> BTreeSet<TaskId> {
        let Ok(relative) = path.strip_prefix(&self.source_dir) else {
            return BTreeSet::new();
        };
        let relative = slash_path(relative);

        self.rules
            .iter()
            .filter(|rule| rule.matches(&relative))
            .flat_map(|rule| rule.tasks.iter().copied())
            .collect()
    }
}

/// `/`-joined normal components of `path`.
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Wait for the next batch of work.
///
/// Blocks until an event maps to at least one task, then keeps collecting
/// until no event arrives for `debounce`. Returns `None` once the channel is
/// closed and nothing is pending.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<WatchEvent>,
    table: &WatchTable,
    debounce: Duration,
) -> Option<BTreeSet<TaskId>> {
    let mut tasks = BTreeSet::new();

    while tasks.is_empty() {
        let event = rx.recv().await?;
        tasks.extend(table.tasks_for(event.path()));
    }

    loop {
        match tokio::time::timeout(debounce, rx.recv()).await {
            Ok(Some(event)) => tasks.extend(table.tasks_for(event.path())),
            Ok(None) | Err(_) => return Some(tasks),
        }
    }
}

/// Serial rebuild loop for the dev server.
pub struct Dispatcher {
    orchestrator: Orchestrator,
    table: WatchTable,
    debounce: Duration,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator, table: WatchTable, debounce: Duration) -> Self {
        Self {
            orchestrator,
            table,
            debounce,
        }
    }

    /// Run until the event channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<WatchEvent>) {
        while let Some(tasks) = next_batch(&mut rx, &self.table, self.debounce).await {
            let names: Vec<_> = tasks.iter().map(TaskId::name).collect();
            tracing::info!("Rebuilding: {}", names.join(", "));

            match self
                .orchestrator
                .run(&tasks, BuildOptions::uncompressed())
                .await
            {
                Ok(report) if report.is_success() => {
                    tracing::info!("Rebuilt in {}ms", report.duration_ms);
                }
                Ok(report) => {
                    for (id, e) in report.failures() {
                        tracing::error!("{} failed: {}", id, e);
                    }
                    for id in report.skipped() {
                        tracing::warn!("{} skipped", id);
                    }
                }
                Err(e) => tracing::error!("Cannot schedule rebuild: {}", e),
            }
        }
    }
}
