//! In-process fakes for the model, sandbox and browser tab.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use scrapegen::crawl::navigation_key;
use scrapegen::error::{ExtractError, ExtractResult};
use scrapegen::host::{ContentConverter, PageHost};
use scrapegen::llm::{ChatMessage, LanguageModel, LlmError};
use scrapegen::models::{PageContent, PageEvent};
use scrapegen::sandbox::Sandbox;

/// `{"explanation": ..., "code": ...}` as a model would send it.
pub fn payload(code: &str) -> String {
    serde_json::json!({"explanation": "test routine", "code": code}).to_string()
}

/// Model that replays canned replies in order and records every request.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Api("script exhausted".to_string())))
    }
}

/// Sandbox whose behavior is a closure over `(code, input)`.
pub struct FnSandbox<F>(pub F);

#[async_trait]
impl<F> Sandbox for FnSandbox<F>
where
    F: Fn(&str, &str) -> ExtractResult<Value> + Send + Sync,
{
    async fn run(&self, code: &str, input: &str) -> ExtractResult<Value> {
        (self.0)(code, input)
    }
}

/// Sandbox that knows a fixed set of routines by their exact source.
pub fn routine_table(routines: Vec<(&str, Value)>) -> impl Sandbox {
    let table: HashMap<String, Value> = routines
        .into_iter()
        .map(|(code, output)| (code.to_string(), output))
        .collect();
    FnSandbox(move |code: &str, _input: &str| {
        table
            .get(code)
            .cloned()
            .ok_or_else(|| ExtractError::Execution("SyntaxError: Unexpected identifier".into()))
    })
}

/// Converter that hands the raw page content through unchanged.
pub struct RawText;

impl ContentConverter for RawText {
    fn convert(&self, page: &PageContent, _page_url: &str) -> ExtractResult<String> {
        Ok(page.content.clone())
    }
}

/// Tab serving canned pages keyed by navigation key.
///
/// Navigating emits `loading` then `complete` synchronously, except for URLs
/// marked unreachable, which never complete. The page helper is lost on
/// every navigation and must be re-injected. Pages registered as flaky fail
/// extraction a fixed number of times before serving content.
pub struct FakeTab {
    pages: HashMap<String, PageContent>,
    unreachable: Vec<String>,
    flaky: Mutex<HashMap<String, usize>>,
    helper_broken: bool,
    current: Mutex<String>,
    events: broadcast::Sender<PageEvent>,
    helper_installed: AtomicBool,
    navigations: Mutex<Vec<String>>,
    injections: AtomicUsize,
    extractions: AtomicUsize,
}

impl FakeTab {
    pub fn new(start_url: &str) -> Self {
        Self {
            pages: HashMap::new(),
            unreachable: Vec::new(),
            flaky: Mutex::new(HashMap::new()),
            helper_broken: false,
            current: Mutex::new(start_url.to_string()),
            events: broadcast::channel(32).0,
            helper_installed: AtomicBool::new(true),
            navigations: Mutex::new(Vec::new()),
            injections: AtomicUsize::new(0),
            extractions: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, url: &str, title: &str, content: &str) -> Self {
        self.pages.insert(
            navigation_key(url),
            PageContent {
                content: content.to_string(),
                title: title.to_string(),
                metadata: Default::default(),
            },
        );
        self
    }

    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.push(navigation_key(url));
        self
    }

    /// Fail the first `failures` extractions on `url`.
    pub fn with_flaky_extraction(self, url: &str, failures: usize) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(navigation_key(url), failures);
        self
    }

    /// Injection is accepted but the helper never answers afterwards.
    pub fn with_broken_helper(mut self) -> Self {
        self.helper_broken = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageHost for FakeTab {
    async fn current_url(&self) -> ExtractResult<String> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn navigate(&self, url: &str) -> ExtractResult<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        *self.current.lock().unwrap() = url.to_string();
        self.helper_installed.store(false, Ordering::SeqCst);

        let _ = self.events.send(PageEvent::loading(url));
        if !self.unreachable.contains(&navigation_key(url)) {
            let _ = self.events.send(PageEvent::complete(url));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> bool {
        self.helper_installed.load(Ordering::SeqCst)
    }

    async fn inject_content_script(&self) -> ExtractResult<()> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        if !self.helper_broken {
            self.helper_installed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn extract_content(&self) -> ExtractResult<PageContent> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        if !self.helper_installed.load(Ordering::SeqCst) {
            return Err(ExtractError::Host("page helper not installed".into()));
        }
        let current = self.current.lock().unwrap().clone();
        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(&navigation_key(&current)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExtractError::Host("document not ready".into()));
            }
        }
        self.pages
            .get(&navigation_key(&current))
            .cloned()
            .ok_or_else(|| ExtractError::Host(format!("no content for {}", current)))
    }
}
