mod common;

use std::sync::Arc;

use serde_json::json;

use common::{payload, FakeTab, FnSandbox, RawText, ScriptedModel};
use scrapegen::cache::ParserCache;
use scrapegen::crawl::{CrawlConfig, StopReason};
use scrapegen::error::ExtractError;
use scrapegen::export::{ExportFormat, FileSink};
use scrapegen::session::{ClipperSession, ParserSource};
use scrapegen::storage::FileStore;

const ROUTINE: &str = "function extractProducts(text) { return [{ name: text }]; }";

fn session(
    tab: FakeTab,
    model: ScriptedModel,
    cache: ParserCache,
    out: &std::path::Path,
) -> ClipperSession {
    ClipperSession::new(
        Arc::new(tab),
        Arc::new(RawText),
        Arc::new(model),
        cache,
        Arc::new(FileSink::new(out)),
    )
    .with_sandbox(Arc::new(FnSandbox(|_code: &str, input: &str| {
        if input.starts_with("item") {
            Ok(json!([{ "name": input, "priceRaw": "$5.00" }]))
        } else {
            Ok(json!([]))
        }
    })))
    .with_crawl_config(CrawlConfig::fast())
}

async fn file_cache(dir: &std::path::Path) -> ParserCache {
    ParserCache::new(Arc::new(FileStore::open(dir.join("parsers")).await.unwrap()))
}

#[tokio::test]
async fn test_crawl_reuses_prefix_cached_routine_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(dir.path()).await;
    cache
        .put("https://shop.example/list", ROUTINE, "All")
        .await
        .unwrap();

    let tab = FakeTab::new("https://shop.example/list/shoes")
        .with_page("https://shop.example/list/shoes", "Shoes: Sale", "item-1")
        .with_page("https://shop.example/list/shoes?page=2", "Shoes: Sale", "item-2")
        .with_page("https://shop.example/list/shoes?page=3", "Shoes: Sale", "none")
        .with_page("https://shop.example/list/shoes?page=4", "Shoes: Sale", "none");

    let session = session(tab, ScriptedModel::ok(&[]), cache, &dir.path().join("out"));
    let summary = session
        .crawl_all_pages(None, Some(10), ExportFormat::Json)
        .await
        .unwrap();

    assert!(matches!(summary.source, ParserSource::Cached));
    assert_eq!(summary.parser.source_url, "https://shop.example/list");
    assert_eq!(summary.report.products.len(), 2);
    assert_eq!(summary.report.stop_reason, StopReason::Exhausted);

    let expected = dir
        .path()
        .join("out/code-generated/Shoes_ Sale/extracted-products-all-pages.json");
    assert_eq!(summary.saved_to, expected.display().to_string());
    let saved: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&expected).await.unwrap()).unwrap();
    assert_eq!(saved[1]["name"], "item-2");
    assert_eq!(saved[1]["priceNormalized"], 5.0);
    assert_eq!(saved[1]["currency"], "USD");
}

#[tokio::test]
async fn test_cache_miss_generates_then_extracts_single_page() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(dir.path()).await;
    let tab = FakeTab::new("https://shop.example/hats").with_page(
        "https://shop.example/hats",
        "Hats",
        "item-hat",
    );

    let session = session(
        tab,
        ScriptedModel::ok(&[&payload(ROUTINE)]),
        cache.clone(),
        &dir.path().join("out"),
    );
    let extraction = session
        .extract_current_page(ExportFormat::Markdown)
        .await
        .unwrap();

    assert!(matches!(
        extraction.source,
        ParserSource::Generated {
            iterations: 1,
            validated: true
        }
    ));
    assert_eq!(extraction.products.len(), 1);
    assert!(extraction.saved_to.ends_with("extracted-products.md"));
    assert_eq!(
        cache.get_exact("https://shop.example/hats").await.unwrap().unwrap().code,
        ROUTINE
    );
}

#[tokio::test]
async fn test_no_cache_and_no_content_is_no_parser() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(dir.path()).await;
    let tab = FakeTab::new("https://shop.example/empty").with_page(
        "https://shop.example/empty",
        "",
        "   ",
    );
    let model = ScriptedModel::ok(&[]);

    let session = session(tab, model, cache, &dir.path().join("out"));
    let err = session
        .crawl_all_pages(None, None, ExportFormat::Json)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoParser(ref url) if url == "https://shop.example/empty"));
}
