//! Parser cache management commands.

use std::io::{self, Write};

use console::style;

use crate::cli::helpers::open_cache;
use crate::config::Config;

pub async fn cmd_cache_list(config: &Config) -> anyhow::Result<()> {
    let cache = open_cache(config).await?;
    let mut entries = cache.entries().await?;

    if entries.is_empty() {
        println!("{} No cached routines", style("!").yellow());
        return Ok(());
    }

    entries.sort_by(|a, b| a.1.source_url.cmp(&b.1.source_url));
    println!("\n{}", style("Cached routines").bold());
    println!("{}", "-".repeat(80));
    for (_, parser) in &entries {
        println!(
            "{:<50} {:>6} bytes  {}",
            parser.source_url,
            parser.code.len(),
            style(parser.generated_at.format("%Y-%m-%d %H:%M")).dim()
        );
    }
    println!("\n{} routines in {}", entries.len(), config.cache_dir().display());
    Ok(())
}

pub async fn cmd_cache_show(config: &Config, url: &str) -> anyhow::Result<()> {
    let cache = open_cache(config).await?;
    match cache.load(url).await? {
        Some(parser) => {
            println!("{}: {}", style("Source").bold(), parser.source_url);
            println!("{}: {}", style("Title").bold(), parser.title);
            println!("{}: {}", style("Generated").bold(), parser.generated_at);
            println!("\n{}", parser.code);
        }
        None => println!("{} No routine matches {}", style("!").yellow(), url),
    }
    Ok(())
}

pub async fn cmd_cache_remove(config: &Config, url: &str) -> anyhow::Result<()> {
    let cache = open_cache(config).await?;
    if cache.remove(url).await? {
        println!("{} Removed routine for {}", style("✓").green(), url);
    } else {
        println!("{} No routine stored for {}", style("!").yellow(), url);
    }
    Ok(())
}

pub async fn cmd_cache_clear(config: &Config, confirmed: bool) -> anyhow::Result<()> {
    let cache = open_cache(config).await?;

    if !confirmed {
        print!("Remove all cached routines? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Aborted");
            return Ok(());
        }
    }

    let removed = cache.clear().await?;
    println!("{} Removed {} routines", style("✓").green(), removed);
    Ok(())
}
