//! Build target commands.

use anyhow::Result;
use quarry_static::{BuildOptions, Orchestrator, SiteLayout, Target};

/// Run one named target.
pub async fn run(layout: SiteLayout, target: Target, options: BuildOptions) -> Result<()> {
    tracing::info!("Running {}...", target);

    let output_dir = layout.output_dir.clone();
    let report = Orchestrator::new(layout)?.run_target(target, options).await?;

    for id in report.skipped() {
        tracing::warn!("Skipped {}", id);
    }

    let failed: Vec<_> = report.failures().map(|(id, _)| id.name()).collect();
    if !failed.is_empty() {
        anyhow::bail!("{} failed: {}", target, failed.join(", "));
    }

    tracing::info!("Finished {} in {}ms", target, report.duration_ms);
    tracing::info!("Output: {}", output_dir.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn layout(root: &std::path::Path) -> SiteLayout {
        SiteLayout {
            source_dir: root.join("source"),
            output_dir: root.join("build"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reports_failed_target() {
        let temp = tempdir().unwrap();

        let err = run(layout(temp.path()), Target::BuildHtml, BuildOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("build-html failed: html"));
    }

    #[tokio::test]
    async fn clean_succeeds_on_fresh_tree() {
        let temp = tempdir().unwrap();
        let layout = layout(temp.path());
        let output = layout.output_dir.clone();

        run(layout, Target::Clean, BuildOptions::default())
            .await
            .unwrap();

        assert!(output.is_dir());
        assert_eq!(fs::read_dir(output).unwrap().count(), 0);
    }
}
