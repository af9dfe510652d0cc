//! Single-page commands: generate and extract.

use console::style;

use crate::cli::helpers::{spinner, start_session};
use crate::config::Config;
use crate::export::ExportFormat;
use crate::session::ParserSource;

/// Generate a fresh routine for `url`, replacing any cached one.
pub async fn cmd_generate(config: &Config, url: &str, show_code: bool) -> anyhow::Result<()> {
    let pb = spinner(format!("Opening {}", url));
    let (browser, session) = start_session(config, url).await?;

    pb.set_message("Capturing page content...");
    let page = match session.capture().await {
        Ok(page) => page,
        Err(e) => {
            pb.finish_and_clear();
            browser.close().await;
            return Err(e.into());
        }
    };

    pb.set_message(format!("Generating routine with {}...", config.llm.model));
    let outcome = session.generate_parser(&page).await;
    pb.finish_and_clear();
    browser.close().await;
    let outcome = outcome?;

    let status = if outcome.validated {
        style("validated").green()
    } else {
        style("unvalidated").yellow()
    };
    println!(
        "{} Routine for {} ({}, {} iteration{})",
        style("✓").green(),
        style(&outcome.parser.title).bold(),
        status,
        outcome.iterations,
        if outcome.iterations == 1 { "" } else { "s" }
    );
    println!("  cached under {}", style(&outcome.parser.source_url).dim());

    if show_code {
        println!("\n{}", outcome.parser.code);
    }
    Ok(())
}

/// Extract products from `url` only.
pub async fn cmd_extract(config: &Config, url: &str, format: ExportFormat) -> anyhow::Result<()> {
    let pb = spinner(format!("Opening {}", url));
    let (browser, session) = start_session(config, url).await?;

    pb.set_message("Extracting products...");
    let result = session.extract_current_page(format).await;
    pb.finish_and_clear();
    browser.close().await;
    let extraction = result?;

    let origin = match extraction.source {
        ParserSource::Cached => "cached routine".to_string(),
        ParserSource::Generated { iterations, .. } => {
            format!("new routine, {} iterations", iterations)
        }
    };
    println!(
        "{} {} products ({})",
        style("✓").green(),
        extraction.products.len(),
        origin
    );
    println!("  saved to {}", style(&extraction.saved_to).cyan());
    Ok(())
}
