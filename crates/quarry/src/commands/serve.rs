//! Development server command.

use anyhow::Result;
use quarry_server::{DevServer, DevServerConfig};

/// Run the dev server.
pub async fn run(config: DevServerConfig) -> Result<()> {
    if !config.layout.source_dir.is_dir() {
        anyhow::bail!(
            "Source directory not found: {}. Run 'quarry init' first.",
            config.layout.source_dir.display()
        );
    }

    tracing::info!("Starting development server on port {}", config.port);

    DevServer::new(config).start().await?;

    Ok(())
}
