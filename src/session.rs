//! Per-activation context tying the pipeline together.
//!
//! A [`ClipperSession`] owns everything one run needs (tab, model, sandbox,
//! cache, sink, settings and the cancel flag) and exposes the three user
//! operations: generate a routine, extract the current page, crawl all pages.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::ParserCache;
use crate::codegen::{GenerationOutcome, ParserGenerator};
use crate::crawl::{CancelFlag, CrawlConfig, CrawlReport, CrawlRequest, PaginationCrawler};
use crate::error::{ExtractError, ExtractResult};
use crate::export::{export_products, ExportFormat, ResultSink};
use crate::host::{ContentConverter, PageHost};
use crate::llm::{LanguageModel, LlmConfig};
use crate::models::{products_from_values, GeneratedParser, Product};
use crate::sandbox::{run_extractor, Sandbox};

/// Content of the page currently loaded in the tab, ready for the model.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// Where a routine came from.
#[derive(Debug, Clone)]
pub enum ParserSource {
    Cached,
    Generated { iterations: u32, validated: bool },
}

#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub parser: GeneratedParser,
    pub source: ParserSource,
    pub products: Vec<Product>,
    pub saved_to: String,
}

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub parser: GeneratedParser,
    pub source: ParserSource,
    pub report: CrawlReport,
    pub saved_to: String,
}

pub struct ClipperSession {
    host: Arc<dyn PageHost>,
    converter: Arc<dyn ContentConverter>,
    model: Arc<dyn LanguageModel>,
    sandbox: Option<Arc<dyn Sandbox>>,
    cache: ParserCache,
    sink: Arc<dyn ResultSink>,
    llm: LlmConfig,
    crawl: CrawlConfig,
    cancel: CancelFlag,
}

impl ClipperSession {
    pub fn new(
        host: Arc<dyn PageHost>,
        converter: Arc<dyn ContentConverter>,
        model: Arc<dyn LanguageModel>,
        cache: ParserCache,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            host,
            converter,
            model,
            sandbox: None,
            cache,
            sink,
            llm: LlmConfig::default(),
            crawl: CrawlConfig::default(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    pub fn with_llm_config(mut self, config: LlmConfig) -> Self {
        self.llm = config;
        self
    }

    pub fn with_crawl_config(mut self, config: CrawlConfig) -> Self {
        self.crawl = config;
        self
    }

    /// Handle for stopping a crawl from elsewhere (e.g. a Ctrl-C handler).
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &ParserCache {
        &self.cache
    }

    /// Extract and convert whatever the tab currently shows.
    pub async fn capture(&self) -> ExtractResult<CapturedPage> {
        let url = self.host.current_url().await?;
        if !self.host.ping().await {
            debug!("Installing page helper on {}", url);
            self.host.inject_content_script().await?;
        }
        let content = self.host.extract_content().await?;
        let text = self.converter.convert(&content, &url)?;

        let title = if content.title.trim().is_empty() {
            url::Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| url.clone())
        } else {
            content.title.trim().to_string()
        };

        Ok(CapturedPage { url, title, text })
    }

    /// Run the reflection loop on `page` and cache the result.
    pub async fn generate_parser(&self, page: &CapturedPage) -> ExtractResult<GenerationOutcome> {
        if page.text.trim().is_empty() {
            return Err(ExtractError::NoParser(page.url.clone()));
        }
        let mut generator = ParserGenerator::new(self.model.as_ref(), &self.cache, &self.llm);
        if let Some(ref sandbox) = self.sandbox {
            generator = generator.with_sandbox(sandbox.as_ref());
        }
        generator.generate(&page.url, &page.title, &page.text).await
    }

    /// Cached routine for the page, or a freshly generated one.
    pub async fn resolve_parser(
        &self,
        page: &CapturedPage,
    ) -> ExtractResult<(GeneratedParser, ParserSource)> {
        if let Some(parser) = self.cache.load(&page.url).await? {
            info!("Using cached routine from {}", parser.source_url);
            return Ok((parser, ParserSource::Cached));
        }
        let outcome = self.generate_parser(page).await?;
        Ok((
            outcome.parser,
            ParserSource::Generated {
                iterations: outcome.iterations,
                validated: outcome.validated,
            },
        ))
    }

    fn sandbox(&self) -> ExtractResult<&dyn Sandbox> {
        self.sandbox
            .as_deref()
            .ok_or_else(|| ExtractError::Execution("no execution host available".to_string()))
    }

    /// Extract products from the current page only and export them.
    pub async fn extract_current_page(&self, format: ExportFormat) -> ExtractResult<PageExtraction> {
        let page = self.capture().await?;
        let (parser, source) = self.resolve_parser(&page).await?;

        let items = run_extractor(self.sandbox()?, &parser.code, &page.text).await?;
        let products = products_from_values(&items);
        info!("Extracted {} products from {}", products.len(), page.url);

        let saved_to = export_products(
            self.sink.as_ref(),
            &products,
            &page.title,
            &page.url,
            false,
            format,
        )
        .await?;

        Ok(PageExtraction {
            parser,
            source,
            products,
            saved_to,
        })
    }

    /// Crawl the listing in the tab page by page and export everything found,
    /// including partial results of a cancelled crawl.
    pub async fn crawl_all_pages(
        &self,
        pagination_param: Option<&str>,
        max_pages: Option<u32>,
        format: ExportFormat,
    ) -> ExtractResult<CrawlSummary> {
        let page = self.capture().await?;
        let (parser, source) = self.resolve_parser(&page).await?;

        let mut request = CrawlRequest::new(page.url.clone(), parser.code.clone(), &self.crawl)
            .with_initial_text(page.text.clone());
        if let Some(param) = pagination_param {
            request.pagination_param = param.to_string();
        }
        if let Some(max) = max_pages {
            request.max_pages = max;
        }

        let crawler = PaginationCrawler::new(
            self.host.as_ref(),
            self.converter.as_ref(),
            self.sandbox()?,
            &self.crawl,
            self.cancel.clone(),
        );
        let report = crawler.run(&request).await;

        let saved_to = export_products(
            self.sink.as_ref(),
            &report.products,
            &page.title,
            &page.url,
            true,
            format,
        )
        .await?;

        Ok(CrawlSummary {
            parser,
            source,
            report,
            saved_to,
        })
    }
}
