use console::style;

use crate::config::Config;
use crate::llm::LlmClient;

/// Report whether the configured model endpoint answers.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let llm = LlmClient::new(config.llm.clone())?;
    let llm_config = llm.config();

    println!("\n{}", style("Language model").bold());
    println!("  Provider:  {:?}", llm_config.provider);
    println!("  Endpoint:  {}", llm_config.endpoint);
    println!("  Model:     {}", llm_config.model);

    if !llm_config.enabled {
        println!("  Status:    {}", style("disabled").yellow());
    } else if llm.is_available().await {
        println!("  Status:    {}", style("✓ available").green());
    } else {
        println!("  Status:    {}", style("✗ not reachable").red());
    }

    println!("\n{}", style("Parser cache").bold());
    println!("  Directory: {}", config.cache_dir().display());

    println!("\n{}", style("Browser").bold());
    match config.browser.remote_url {
        Some(ref url) => println!("  Remote:    {}", url),
        None => println!("  Headless:  {}", config.browser.headless),
    }
    if !cfg!(feature = "browser") {
        println!(
            "  {}",
            style("not compiled (enable the browser feature)").dim()
        );
    }
    Ok(())
}
