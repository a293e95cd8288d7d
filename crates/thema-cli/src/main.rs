// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use thema_cli::commands;
use thema_cli::commands::render::RenderRequest;
use thema_cli::config::{Config, CONFIG_FILE};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "thema")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Tag-based theme compiler and renderer", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: String,

    /// Debug mode: recompile templates whose source changed
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode: no progress output (useful for CI)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every template of the theme into the cache
    Warmup,
    /// Render a template
    Render {
        /// Logical template name, e.g. pages/home
        name: String,
        /// JSON file with the render context
        #[arg(long)]
        context: Option<String>,
        /// Render only the page's content block
        #[arg(long)]
        partial: bool,
        /// Locale for translations
        #[arg(long)]
        locale: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Remove all compiled templates from the cache
    ClearCache,
    /// Watch the theme and recompile templates on change
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load_from(&cli.config)?;
    if cli.debug {
        config.render.debug = true;
    }

    match cli.command {
        Commands::Warmup => commands::warmup::run(&config, cli.quiet).await,
        Commands::Render {
            name,
            context,
            partial,
            locale,
            output,
        } => {
            let request = RenderRequest {
                name,
                context_file: context,
                partial,
                locale,
            };
            commands::render::run(&config, request, output).await
        }
        Commands::ClearCache => commands::clear_cache::run(&config).await,
        Commands::Watch => {
            // Watching is only useful when changed sources are picked up.
            config.render.debug = true;
            commands::watch::run(&config).await
        }
    }
}
