//! Task graph, named targets, and the orchestrator that runs them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use crate::assets::HIGHLIGHT_PREFIX;
use crate::builder::{BuildError, BuildOptions, SiteBuilder};
use crate::layout::SiteLayout;

/// A single unit of build work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Clean,
    Fonts,
    Images,
    Scripts,
    Styles,
    HighlightTheme,
    Html,
    Lint,
}

impl TaskId {
    pub const ALL: [TaskId; 8] = [
        TaskId::Clean,
        TaskId::Fonts,
        TaskId::Images,
        TaskId::Scripts,
        TaskId::Styles,
        TaskId::HighlightTheme,
        TaskId::Html,
        TaskId::Lint,
    ];

    /// The tasks of a full site build.
    pub const BUILD: [TaskId; 6] = [
        TaskId::Fonts,
        TaskId::Images,
        TaskId::Scripts,
        TaskId::Styles,
        TaskId::HighlightTheme,
        TaskId::Html,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Fonts => "fonts",
            Self::Images => "images",
            Self::Scripts => "scripts",
            Self::Styles => "styles",
            Self::HighlightTheme => "highlight-theme",
            Self::Html => "html",
            Self::Lint => "lint",
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node of the task graph.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,

    /// Tasks that must finish first when scheduled in the same run
    pub after: Vec<TaskId>,

    /// Source paths the task reads
    pub inputs: Vec<PathBuf>,

    /// Output paths the task owns
    pub outputs: Vec<PathBuf>,
}

impl TaskNode {
    fn new(id: TaskId) -> Self {
        Self {
            id,
            after: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn after(mut self, deps: &[TaskId]) -> Self {
        self.after.extend_from_slice(deps);
        self
    }

    fn reads(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.inputs.extend(paths);
        self
    }

    fn writes(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.outputs.extend(paths);
        self
    }
}

/// Errors in graph construction or scheduling.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("Task graph has a cycle through '{0}'")]
    Cycle(TaskId),

    #[error("Tasks '{0}' and '{1}' both write {path}", path = .2.display())]
    OverlappingOutputs(TaskId, TaskId, PathBuf),

    #[error(
        "Task '{task}' reads {} written by '{producer}' but is not ordered after it",
        path.display()
    )]
    UnorderedInput {
        task: TaskId,
        producer: TaskId,
        path: PathBuf,
    },

    #[error("Task '{0}' is not in the graph")]
    UnknownTask(TaskId),
}

/// Directed acyclic graph of build tasks.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, TaskNode>,
}

impl TaskGraph {
    /// Build a graph, rejecting unknown dependencies, cycles, tasks that
    /// claim the same output and tasks reading another task's output without
    /// an ordering edge to it.
    pub fn new(nodes: impl IntoIterator<Item = TaskNode>) -> Result<Self, GraphError> {
        let nodes: BTreeMap<TaskId, TaskNode> = nodes.into_iter().map(|n| (n.id, n)).collect();

        for node in nodes.values() {
            if let Some(dependency) = node.after.iter().find(|d| !nodes.contains_key(*d)) {
                return Err(GraphError::UnknownDependency {
                    task: node.id,
                    dependency: *dependency,
                });
            }
        }

        let mut owners: BTreeMap<&PathBuf, TaskId> = BTreeMap::new();
        for node in nodes.values() {
            for output in &node.outputs {
                if let Some(owner) = owners.insert(output, node.id) {
                    return Err(GraphError::OverlappingOutputs(owner, node.id, output.clone()));
                }
            }
        }

        for node in nodes.values() {
            for input in &node.inputs {
                let producer = owners
                    .iter()
                    .find(|(output, owner)| **owner != node.id && input.starts_with(output));
                if let Some((_, producer)) = producer {
                    if !node.after.contains(producer) {
                        return Err(GraphError::UnorderedInput {
                            task: node.id,
                            producer: *producer,
                            path: input.clone(),
                        });
                    }
                }
            }
        }

        let graph = Self { nodes };
        graph.schedule(&graph.nodes.keys().copied().collect())?;
        Ok(graph)
    }

    /// The standard site graph for `layout`.
    pub fn standard(layout: &SiteLayout) -> Result<Self, GraphError> {
        let mut script_inputs = vec![layout.manifest_path()];
        script_inputs.extend(
            layout
                .assets
                .libs
                .iter()
                .chain(&layout.assets.search)
                .chain(&layout.assets.scripts)
                .map(|p| layout.source(p)),
        );

        let nodes = vec![
            TaskNode::new(TaskId::Clean),
            TaskNode::new(TaskId::Fonts)
                .after(&[TaskId::Clean])
                .reads([layout.source("fonts")])
                .writes([layout.output("fonts")]),
            TaskNode::new(TaskId::Images)
                .after(&[TaskId::Clean])
                .reads([layout.source("images")])
                .writes([layout.output("images")]),
            TaskNode::new(TaskId::Scripts)
                .after(&[TaskId::Clean])
                .reads(script_inputs)
                .writes([layout.script_bundle()]),
            TaskNode::new(TaskId::Styles)
                .after(&[TaskId::Clean])
                .reads([layout.source("stylesheets")])
                .writes([layout.output("stylesheets").join("*.css")]),
            TaskNode::new(TaskId::HighlightTheme)
                .after(&[TaskId::Clean])
                .reads([layout.manifest_path(), layout.themes_dir()])
                .writes([layout.output("stylesheets").join(format!("{}*.css", HIGHLIGHT_PREFIX))]),
            TaskNode::new(TaskId::Html)
                .after(&[TaskId::Clean])
                .reads([
                    layout.manifest_path(),
                    layout.includes_dir(),
                    layout.source("*.html"),
                ])
                .writes([layout.output("*.html")]),
            TaskNode::new(TaskId::Lint)
                .after(&[TaskId::Clean, TaskId::Html, TaskId::Scripts])
                .reads([layout.output("*.html"), layout.script_bundle()]),
        ];

        Self::new(nodes)
    }

    pub fn node(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    /// Topological waves over `roots`. Ordering edges to tasks outside
    /// `roots` are ignored; tasks in the same wave are independent.
    pub fn schedule(&self, roots: &BTreeSet<TaskId>) -> Result<Vec<Vec<TaskId>>, GraphError> {
        if let Some(missing) = roots.iter().find(|id| !self.nodes.contains_key(*id)) {
            return Err(GraphError::UnknownTask(*missing));
        }

        let mut remaining: BTreeMap<TaskId, BTreeSet<TaskId>> = roots
            .iter()
            .map(|id| {
                let deps = self.nodes[id]
                    .after
                    .iter()
                    .filter(|d| roots.contains(*d))
                    .copied()
                    .collect();
                (*id, deps)
            })
            .collect();

        let mut waves = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<TaskId> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                let stuck = remaining.keys().next().copied().unwrap_or(TaskId::Clean);
                return Err(GraphError::Cycle(stuck));
            }

            for id in &ready {
                remaining.remove(id);
            }
            for deps in remaining.values_mut() {
                for id in &ready {
                    deps.remove(id);
                }
            }
            waves.push(ready);
        }

        Ok(waves)
    }
}

/// A named build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Clean,
    Lint,
    BuildJs,
    BuildCss,
    BuildHtml,
    BuildHighlightjs,
    BuildFonts,
    BuildImages,
    BuildStaticSite,
    BuildUncompressed,
}

impl Target {
    pub const ALL: [Target; 10] = [
        Target::Clean,
        Target::Lint,
        Target::BuildJs,
        Target::BuildCss,
        Target::BuildHtml,
        Target::BuildHighlightjs,
        Target::BuildFonts,
        Target::BuildImages,
        Target::BuildStaticSite,
        Target::BuildUncompressed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Lint => "lint",
            Self::BuildJs => "build-js",
            Self::BuildCss => "build-css",
            Self::BuildHtml => "build-html",
            Self::BuildHighlightjs => "build-highlightjs",
            Self::BuildFonts => "build-fonts",
            Self::BuildImages => "build-images",
            Self::BuildStaticSite => "build-static-site",
            Self::BuildUncompressed => "build-uncompressed",
        }
    }

    /// Tasks the target runs.
    pub fn tasks(&self) -> BTreeSet<TaskId> {
        match self {
            Self::Clean => [TaskId::Clean].into(),
            Self::Lint => [TaskId::Lint].into(),
            Self::BuildJs => [TaskId::Scripts].into(),
            Self::BuildCss => [TaskId::Styles].into(),
            Self::BuildHtml => [TaskId::Html].into(),
            Self::BuildHighlightjs => [TaskId::HighlightTheme].into(),
            Self::BuildFonts => [TaskId::Fonts].into(),
            Self::BuildImages => [TaskId::Images].into(),
            Self::BuildStaticSite | Self::BuildUncompressed => TaskId::BUILD.into(),
        }
    }

    /// Options for a run of this target, starting from `base`.
    pub fn options(&self, base: BuildOptions) -> BuildOptions {
        match self {
            Self::BuildUncompressed => BuildOptions::uncompressed(),
            _ => base,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown target '{}'", s))
    }
}

/// How one task of a run ended.
#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded,
    Failed(BuildError),
    /// Not started because a task it is ordered after failed
    Skipped,
}

/// Per-task outcomes of one orchestrated run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: BTreeMap<TaskId, TaskOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .values()
            .all(|o| matches!(o, TaskOutcome::Succeeded))
    }

    pub fn failures(&self) -> impl Iterator<Item = (TaskId, &BuildError)> {
        self.outcomes.iter().filter_map(|(id, o)| match o {
            TaskOutcome::Failed(e) => Some((*id, e)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TaskOutcome::Skipped))
            .map(|(id, _)| *id)
    }
}

/// Runs sets of tasks over the graph, each wave concurrently.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    builder: Arc<SiteBuilder>,
    graph: Arc<TaskGraph>,
}

impl Orchestrator {
    pub fn new(layout: SiteLayout) -> Result<Self, GraphError> {
        let graph = TaskGraph::standard(&layout)?;
        Ok(Self::with_graph(SiteBuilder::new(layout), graph))
    }

    pub fn with_graph(builder: SiteBuilder, graph: TaskGraph) -> Self {
        Self {
            builder: Arc::new(builder),
            graph: Arc::new(graph),
        }
    }

    pub fn builder(&self) -> &SiteBuilder {
        &self.builder
    }

    /// Run a named target.
    pub async fn run_target(
        &self,
        target: Target,
        base: BuildOptions,
    ) -> Result<RunReport, GraphError> {
        self.run(&target.tasks(), target.options(base)).await
    }

    /// Run `tasks` with `options`.
    ///
    /// A failure never cancels tasks already running. Tasks ordered after a
    /// failed or skipped task are skipped. A task that panics counts as
    /// failed.
    pub async fn run(
        &self,
        tasks: &BTreeSet<TaskId>,
        options: BuildOptions,
    ) -> Result<RunReport, GraphError> {
        let builder = Arc::clone(&self.builder);
        self.run_with(tasks, options, move |id, options| builder.run_task(id, options))
            .await
    }

    async fn run_with<F>(
        &self,
        tasks: &BTreeSet<TaskId>,
        options: BuildOptions,
        runner: F,
    ) -> Result<RunReport, GraphError>
    where
        F: Fn(TaskId, &BuildOptions) -> Result<(), BuildError> + Send + Sync + 'static,
    {
        let runner = Arc::new(runner);
        let start = Instant::now();
        let waves = self.graph.schedule(tasks)?;
        let mut report = RunReport::default();

        for wave in waves {
            let mut set = JoinSet::new();
            let mut running = HashMap::new();

            for id in wave {
                let blocked = self
                    .graph
                    .node(id)
                    .map(|n| {
                        n.after.iter().any(|dep| {
                            matches!(
                                report.outcomes.get(dep),
                                Some(TaskOutcome::Failed(_) | TaskOutcome::Skipped)
                            )
                        })
                    })
                    .unwrap_or(false);

                if blocked {
                    tracing::warn!("Skipping '{}' after an earlier failure", id);
                    report.outcomes.insert(id, TaskOutcome::Skipped);
                    continue;
                }

                let runner = Arc::clone(&runner);
                let handle = set.spawn_blocking(move || runner(id, &options));
                running.insert(handle.id(), id);
            }

            while let Some(joined) = set.join_next_with_id().await {
                let (handle_id, result) = match joined {
                    Ok((handle_id, result)) => (handle_id, result),
                    Err(e) => (e.id(), Err(BuildError::Panicked(e.to_string()))),
                };
                let Some(id) = running.remove(&handle_id) else {
                    continue;
                };

                match result {
                    Ok(()) => {
                        report.outcomes.insert(id, TaskOutcome::Succeeded);
                    }
                    Err(e) => {
                        tracing::error!("Task '{}' failed: {}", id, e);
                        report.outcomes.insert(id, TaskOutcome::Failed(e));
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn layout(root: &Path) -> SiteLayout {
        SiteLayout {
            source_dir: root.join("source"),
            output_dir: root.join("build"),
            ..Default::default()
        }
    }

    #[test]
    fn target_names_round_trip() {
        for target in Target::ALL {
            assert_eq!(target.name().parse::<Target>().unwrap(), target);
        }
        assert!("deploy".parse::<Target>().is_err());
    }

    #[test]
    fn aggregate_targets_cover_every_build_task() {
        let expected: BTreeSet<_> = TaskId::BUILD.into();

        assert_eq!(Target::BuildStaticSite.tasks(), expected);
        assert_eq!(Target::BuildUncompressed.tasks(), expected);
        assert!(!expected.contains(&TaskId::Clean));
        assert!(!expected.contains(&TaskId::Lint));
    }

    #[test]
    fn uncompressed_option_does_not_leak_between_targets() {
        let base = BuildOptions::default();

        assert!(!Target::BuildUncompressed.options(base).compress);
        assert!(Target::BuildJs.options(base).compress);
        assert!(Target::BuildStaticSite.options(base).compress);
    }

    #[test]
    fn standard_graph_orders_lint_after_its_inputs() {
        let temp = tempdir().unwrap();
        let graph = TaskGraph::standard(&layout(temp.path())).unwrap();

        let lint = graph.node(TaskId::Lint).unwrap();

        assert!(lint.after.contains(&TaskId::Html));
        assert!(lint.after.contains(&TaskId::Scripts));
    }

    #[test]
    fn rejects_reading_output_without_ordering() {
        let nodes = vec![
            TaskNode::new(TaskId::Html).writes([PathBuf::from("build/*.html")]),
            TaskNode::new(TaskId::Lint).reads([PathBuf::from("build/*.html")]),
        ];

        assert!(matches!(
            TaskGraph::new(nodes),
            Err(GraphError::UnorderedInput {
                task: TaskId::Lint,
                producer: TaskId::Html,
                ..
            })
        ));
    }

    #[test]
    fn accepts_reading_output_when_ordered() {
        let nodes = vec![
            TaskNode::new(TaskId::Scripts).writes([PathBuf::from("build/javascripts")]),
            TaskNode::new(TaskId::Lint)
                .after(&[TaskId::Scripts])
                .reads([PathBuf::from("build/javascripts/all.js")]),
        ];

        assert!(TaskGraph::new(nodes).is_ok());
    }

    #[test]
    fn build_tasks_share_one_wave() {
        let temp = tempdir().unwrap();
        let graph = TaskGraph::standard(&layout(temp.path())).unwrap();

        let waves = graph.schedule(&TaskId::BUILD.into()).unwrap();

        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 6);
    }

    #[test]
    fn clean_runs_before_builds_and_lint_last() {
        let temp = tempdir().unwrap();
        let graph = TaskGraph::standard(&layout(temp.path())).unwrap();

        let waves = graph.schedule(&TaskId::ALL.into()).unwrap();

        assert_eq!(waves.first().unwrap(), &vec![TaskId::Clean]);
        assert_eq!(waves.last().unwrap(), &vec![TaskId::Lint]);
    }

    #[test]
    fn rejects_cycles() {
        let nodes = vec![
            TaskNode::new(TaskId::Fonts).after(&[TaskId::Images]),
            TaskNode::new(TaskId::Images).after(&[TaskId::Fonts]),
        ];

        assert!(matches!(TaskGraph::new(nodes), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn rejects_unknown_dependencies() {
        let nodes = vec![TaskNode::new(TaskId::Html).after(&[TaskId::Clean])];

        assert!(matches!(
            TaskGraph::new(nodes),
            Err(GraphError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn rejects_overlapping_outputs() {
        let nodes = vec![
            TaskNode::new(TaskId::Fonts).writes([PathBuf::from("build/x")]),
            TaskNode::new(TaskId::Images).writes([PathBuf::from("build/x")]),
        ];

        assert!(matches!(
            TaskGraph::new(nodes),
            Err(GraphError::OverlappingOutputs(..))
        ));
    }

    #[tokio::test]
    async fn failure_is_isolated_from_siblings() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());
        fs::create_dir_all(layout.source("images")).unwrap();
        fs::write(layout.source("images/logo.png"), b"png").unwrap();
        // No manifest: scripts, theme and html fail; images still copy.

        let orchestrator = Orchestrator::new(layout.clone()).unwrap();
        let report = orchestrator
            .run_target(Target::BuildStaticSite, BuildOptions::default())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            report.outcomes.get(&TaskId::Images),
            Some(TaskOutcome::Succeeded)
        ));
        assert!(matches!(
            report.outcomes.get(&TaskId::Html),
            Some(TaskOutcome::Failed(BuildError::Config(_)))
        ));
        assert!(layout.output("images/logo.png").exists());
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_as_failed() {
        let temp = tempdir().unwrap();
        let orchestrator = Orchestrator::new(layout(temp.path())).unwrap();
        let tasks: BTreeSet<_> = [TaskId::Fonts, TaskId::Html, TaskId::Lint].into();

        let report = orchestrator
            .run_with(&tasks, BuildOptions::default(), |id, _| {
                if id == TaskId::Html {
                    panic!("renderer blew up");
                }
                Ok(())
            })
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(matches!(
            report.outcomes.get(&TaskId::Html),
            Some(TaskOutcome::Failed(BuildError::Panicked(_)))
        ));
        assert!(matches!(
            report.outcomes.get(&TaskId::Fonts),
            Some(TaskOutcome::Succeeded)
        ));
        assert_eq!(report.skipped().collect::<Vec<_>>(), vec![TaskId::Lint]);
    }

    #[tokio::test]
    async fn dependents_of_a_failed_task_are_skipped() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());

        let orchestrator = Orchestrator::new(layout).unwrap();
        let tasks: BTreeSet<_> = [TaskId::Html, TaskId::Lint].into();
        let report = orchestrator
            .run(&tasks, BuildOptions::default())
            .await
            .unwrap();

        assert!(matches!(
            report.outcomes.get(&TaskId::Html),
            Some(TaskOutcome::Failed(_))
        ));
        assert_eq!(report.skipped().collect::<Vec<_>>(), vec![TaskId::Lint]);
    }

    #[tokio::test]
    async fn builds_static_site_end_to_end() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout {
            assets: crate::layout::AssetManifest {
                libs: vec!["javascripts/lib/_lib.js".into()],
                search: vec!["javascripts/lib/_search.js".into()],
                scripts: vec!["javascripts/app/_app.js".into()],
            },
            ..layout(temp.path())
        };
        let write = |rel: &str, contents: &str| {
            let path = layout.source(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        };
        write(
            "index.yml",
            "includes: [intro, auth]\nsearch: false\nhighlight_theme: default\n",
        );
        write("includes/intro.md", "# Introduction\n\nWelcome.\n");
        write("includes/auth.md", "# Authentication\n\n```json\n{\"key\": 1}\n```\n");
        write(
            "index.html",
            "<body>{% for include in includes %}{{ include }}{% endfor %}</body>",
        );
        write("javascripts/lib/_lib.js", "var lib = 1;\n");
        write("javascripts/lib/_search.js", "var search = 1;\n");
        write("javascripts/app/_app.js", "var app = 1;\n");
        write("stylesheets/screen.css.scss", "body { margin: 0; }\n");

        let report = Orchestrator::new(layout.clone())
            .unwrap()
            .run_target(Target::BuildStaticSite, BuildOptions::default())
            .await
            .unwrap();

        assert!(report.is_success(), "{:?}", report);
        let html = fs::read_to_string(layout.output("index.html")).unwrap();
        let intro = html.find("Introduction").unwrap();
        let auth = html.find("Authentication").unwrap();
        assert!(intro < auth);
        assert!(html.contains("class=\"highlight json\""));
        assert!(layout.output("stylesheets/highlight-default.css").exists());
        assert!(layout.output("stylesheets/screen.css").exists());

        let bundle = fs::read_to_string(layout.script_bundle()).unwrap();
        assert!(!bundle.contains("search"));
    }
}
