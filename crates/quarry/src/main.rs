//! Quarry CLI - static API documentation site generator.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use quarry_static::Target;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

use config::ConfigFile;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Static API documentation site generator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to quarry.toml config file
    #[arg(short, long, default_value = "quarry.toml", global = true)]
    config: PathBuf,

    /// Skip minification of scripts and stylesheets
    #[arg(long, global = true)]
    no_compress: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new documentation site in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove the output directory
    Clean,

    /// Check the built pages and script bundle
    Lint,

    /// Bundle scripts into javascripts/all.js
    BuildJs,

    /// Compile stylesheets
    BuildCss,

    /// Render the HTML pages
    BuildHtml,

    /// Write the code highlighting stylesheet
    BuildHighlightjs,

    /// Copy fonts
    BuildFonts,

    /// Copy images
    BuildImages,

    /// Build the whole site
    BuildStaticSite,

    /// Build the whole site without minification
    BuildUncompressed,

    /// Build, serve and rebuild on change with live reload
    Serve {
        /// Port to listen on (defaults to config or 4567)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

impl Commands {
    fn target(&self) -> Option<Target> {
        match self {
            Self::Clean => Some(Target::Clean),
            Self::Lint => Some(Target::Lint),
            Self::BuildJs => Some(Target::BuildJs),
            Self::BuildCss => Some(Target::BuildCss),
            Self::BuildHtml => Some(Target::BuildHtml),
            Self::BuildHighlightjs => Some(Target::BuildHighlightjs),
            Self::BuildFonts => Some(Target::BuildFonts),
            Self::BuildImages => Some(Target::BuildImages),
            Self::BuildStaticSite => Some(Target::BuildStaticSite),
            Self::BuildUncompressed => Some(Target::BuildUncompressed),
            Self::Init { .. } | Self::Serve { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    if let Commands::Init { yes } = cli.command {
        return commands::init::run(yes).await;
    }

    let config = ConfigFile::load(&cli.config)?;

    // Execute command
    match cli.command {
        Commands::Serve { port, no_open } => {
            commands::serve::run(config.server(port, !no_open)).await?;
        }
        ref command => {
            if let Some(target) = command.target() {
                commands::build::run(config.layout(), target, config.options(cli.no_compress))
                    .await?;
            }
        }
    }

    Ok(())
}
