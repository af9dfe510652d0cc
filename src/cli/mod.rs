//! CLI parser and command dispatch.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::export::ExportFormat;

#[derive(Parser)]
#[command(name = "scrapegen")]
#[command(about = "Generate, cache and replay product extraction routines")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Model to use (overrides config and LLM_MODEL)
    #[arg(long, global = true, env = "SCRAPEGEN_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or regenerate) an extraction routine for a listing page
    Generate {
        /// Listing page URL
        url: String,
        /// Print the generated code
        #[arg(long)]
        show_code: bool,
    },

    /// Extract products from a single page using a cached or new routine
    Extract {
        url: String,
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Crawl a paginated listing and export all products
    Crawl {
        /// First page of the listing
        url: String,
        /// Query parameter carrying the page number (default from config: "page")
        #[arg(short, long)]
        param: Option<String>,
        /// Maximum number of pages to visit
        #[arg(short, long)]
        max_pages: Option<u32>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Manage cached extraction routines
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Check that the language model is reachable
    Check,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached routines
    List,
    /// Show the routine that would be used for a URL
    Show { url: String },
    /// Remove the routine cached for a URL
    Remove { url: String },
    /// Remove all cached routines
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load_from_path(path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?,
        None => Config::load().await,
    };
    if let Some(model) = cli.model {
        config.llm = config.llm.with_model(&model);
    }

    match cli.command {
        Commands::Generate { url, show_code } => {
            commands::cmd_generate(&config, &url, show_code).await
        }
        Commands::Extract { url, format } => commands::cmd_extract(&config, &url, format).await,
        Commands::Crawl {
            url,
            param,
            max_pages,
            format,
        } => commands::cmd_crawl(&config, &url, param.as_deref(), max_pages, format).await,
        Commands::Cache { command } => match command {
            CacheCommands::List => commands::cmd_cache_list(&config).await,
            CacheCommands::Show { url } => commands::cmd_cache_show(&config, &url).await,
            CacheCommands::Remove { url } => commands::cmd_cache_remove(&config, &url).await,
            CacheCommands::Clear { yes } => commands::cmd_cache_clear(&config, yes).await,
        },
        Commands::Check => commands::cmd_check(&config).await,
    }
}
