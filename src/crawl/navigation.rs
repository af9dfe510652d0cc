//! Navigate the tab and wait, bounded, for the matching load-complete event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing::debug;

use super::pagination::navigation_key;
use crate::error::{ExtractError, ExtractResult};
use crate::host::PageHost;
use crate::models::LoadStatus;

/// One-shot completion: the first `resolve` wins, later ones return false.
pub struct Completion<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn resolve(&self, value: T) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Loaded(String),
    TimedOut,
    Failed(String),
}

/// Navigate `host` to `url` and resolve on whichever comes first: a
/// `complete` or `failed` event whose URL has the same navigation key, the
/// timeout, or a navigation error. Returns the URL reported by the tab.
pub async fn navigate_and_wait(
    host: &dyn PageHost,
    url: &str,
    timeout: Duration,
) -> ExtractResult<String> {
    let target = navigation_key(url);
    // Subscribe before navigating so a fast load is not missed.
    let mut events = host.subscribe();
    let (completion, done) = Completion::new();
    let completion = Arc::new(completion);

    let listener = {
        let completion = completion.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if navigation_key(&event.url) == target => match event.status {
                        LoadStatus::Complete => {
                            completion.resolve(Outcome::Loaded(event.url));
                            break;
                        }
                        LoadStatus::Failed => {
                            completion.resolve(Outcome::Failed(format!(
                                "navigation to {} failed",
                                event.url
                            )));
                            break;
                        }
                        LoadStatus::Loading => {}
                    },
                    Ok(event) => {
                        debug!("Ignoring {:?} event for {}", event.status, event.url);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Navigation listener skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        completion.resolve(Outcome::Failed("tab event stream closed".into()));
                        break;
                    }
                }
            }
        })
    };

    let timer = {
        let completion = completion.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            completion.resolve(Outcome::TimedOut);
        })
    };

    debug!("Navigating to {}", url);
    if let Err(e) = host.navigate(url).await {
        completion.resolve(Outcome::Failed(e.to_string()));
    }

    let outcome = done
        .await
        .unwrap_or_else(|_| Outcome::Failed("navigation wait abandoned".into()));
    listener.abort();
    timer.abort();

    match outcome {
        Outcome::Loaded(final_url) => Ok(final_url),
        Outcome::TimedOut => Err(ExtractError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        }),
        Outcome::Failed(message) => Err(ExtractError::Host(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageContent, PageEvent};
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    /// Tab that reports completion of `lands_on` instead of the requested URL,
    /// or a failed load when `fails` is set.
    struct RedirectingTab {
        events: broadcast::Sender<PageEvent>,
        lands_on: Option<String>,
        fails: bool,
    }

    #[async_trait]
    impl PageHost for RedirectingTab {
        async fn current_url(&self) -> ExtractResult<String> {
            Ok(String::new())
        }

        async fn navigate(&self, url: &str) -> ExtractResult<()> {
            let events = self.events.clone();
            let landed = self.lands_on.clone().unwrap_or_else(|| url.to_string());
            let finished = if self.fails {
                PageEvent::failed(url)
            } else {
                PageEvent::complete(landed)
            };
            let _ = events.send(PageEvent::loading(url));
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let _ = events.send(finished);
            });
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
            self.events.subscribe()
        }

        async fn ping(&self) -> bool {
            true
        }

        async fn inject_content_script(&self) -> ExtractResult<()> {
            Ok(())
        }

        async fn extract_content(&self) -> ExtractResult<PageContent> {
            Ok(PageContent::default())
        }
    }

    fn tab(lands_on: Option<&str>) -> RedirectingTab {
        RedirectingTab {
            events: broadcast::channel(8).0,
            lands_on: lands_on.map(str::to_string),
            fails: false,
        }
    }

    #[test]
    fn test_completion_resolves_once() {
        let (completion, mut rx) = Completion::new();
        assert!(completion.resolve(1));
        assert!(!completion.resolve(2));
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_matching_event_resolves() {
        let host = tab(Some("https://x/list?sort=new&page=2"));
        let landed = navigate_and_wait(
            &host,
            "https://x/list?page=2&sort=new",
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(landed, "https://x/list?sort=new&page=2");
    }

    #[tokio::test]
    async fn test_other_url_times_out() {
        let host = tab(Some("https://x/list"));
        let err = navigate_and_wait(&host, "https://x/list?page=2", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NavigationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_failed_load_resolves_without_waiting() {
        let host = RedirectingTab {
            fails: true,
            ..tab(None)
        };
        let started = std::time::Instant::now();
        let err = navigate_and_wait(&host, "https://x/list?page=2", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Host(ref m) if m.contains("failed")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
