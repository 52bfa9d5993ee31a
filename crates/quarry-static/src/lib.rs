//! Build pipeline for quarry documentation sites.
//!
//! Renders Markdown includes into page templates, bundles scripts, compiles
//! stylesheets, copies static trees, and schedules all of it as a task graph.

pub mod assets;
pub mod builder;
pub mod copier;
pub mod layout;
pub mod lint;
pub mod page;
pub mod tasks;

pub use builder::{BuildError, BuildOptions, SiteBuilder};
pub use layout::{AssetManifest, SiteLayout};
pub use tasks::{GraphError, Orchestrator, RunReport, Target, TaskGraph, TaskId, TaskOutcome};
