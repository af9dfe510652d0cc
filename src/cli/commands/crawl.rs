//! Multi-page crawl command.

use console::style;

use crate::cli::helpers::{spinner, start_session};
use crate::config::Config;
use crate::crawl::StopReason;
use crate::export::ExportFormat;

pub async fn cmd_crawl(
    config: &Config,
    url: &str,
    param: Option<&str>,
    max_pages: Option<u32>,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let pb = spinner(format!("Opening {}", url));
    let (browser, session) = start_session(config, url).await?;

    // Ctrl-C stops after the current page; results so far are kept.
    let cancel = session.cancel_flag();
    let pb_signal = pb.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            pb_signal.set_message("Stopping after the current page...");
            cancel.cancel();
        }
    });

    pb.set_message(format!(
        "Crawling up to {} pages...",
        max_pages.unwrap_or(config.crawl.max_pages)
    ));
    let result = session.crawl_all_pages(param, max_pages, format).await;
    signal.abort();
    pb.finish_and_clear();
    browser.close().await;
    let summary = result?;

    let report = &summary.report;
    let reason = match report.stop_reason {
        StopReason::Exhausted => style("no more products").green(),
        StopReason::MaxPages => style("page limit reached").green(),
        StopReason::Cancelled => style("cancelled").yellow(),
    };
    println!(
        "{} {} products from {} pages ({})",
        if report.completed_naturally {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        report.products.len(),
        report.pages_visited,
        reason
    );
    println!("  saved to {}", style(&summary.saved_to).cyan());
    Ok(())
}
