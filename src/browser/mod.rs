//! Browser session seam.
//!
//! Stages never talk to a browser directly. They open a [`BrowserSession`]
//! through a [`SessionProvider`], open pages from it, and always close what
//! they open. The chromiumoxide backend lives in [`chrome`]; tests plug in
//! scripted pages.

#[cfg(feature = "browser")]
mod chrome;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ScrapeError, ScrapeResult};

pub use crate::config::browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use chrome::{ChromeSession, ChromeSessionProvider};

/// Script returning `window.scrollY + window.innerHeight`.
pub const SCROLL_EXTENT_SCRIPT: &str = "window.scrollY + window.innerHeight";

/// A loaded page owned by exactly one task.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for the page to settle, bounded by the session's
    /// navigation timeout.
    async fn goto(&self, url: &str) -> ScrapeResult<()>;

    /// URL of the last navigation.
    async fn url(&self) -> String;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> ScrapeResult<serde_json::Value>;

    async fn close(&self) -> ScrapeResult<()>;

    async fn scroll_by(&self, pixels: u32) -> ScrapeResult<()> {
        self.evaluate(&format!("window.scrollBy(0, {})", pixels))
            .await
            .map(|_| ())
    }

    /// Bottom edge of the viewport in document coordinates.
    async fn scroll_extent(&self) -> ScrapeResult<f64> {
        let value = self.evaluate(SCROLL_EXTENT_SCRIPT).await?;
        match value.as_f64() {
            Some(extent) => Ok(extent),
            None => Err(ScrapeError::extraction(
                self.url().await,
                "scroll extent is not a number",
            )),
        }
    }

    /// Highest `data-index` among elements matching `selector`, if any are rendered.
    async fn rendered_index(&self, selector: &str) -> ScrapeResult<Option<u64>> {
        let script = format!(
            r#"(() => {{
                let max = null;
                document.querySelectorAll({selector}).forEach((el) => {{
                    const idx = parseInt(el.getAttribute('data-index'), 10);
                    if (!Number.isNaN(idx) && (max === null || idx > max)) max = idx;
                }});
                return max;
            }})()"#,
            selector = serde_json::Value::String(selector.to_string())
        );
        Ok(self.evaluate(&script).await?.as_u64())
    }
}

/// A browser session shared by the tasks of one stage run.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> ScrapeResult<Arc<dyn PageHandle>>;

    /// Tear the session down. Callers close their pages first.
    async fn close(&self) -> ScrapeResult<()>;
}

/// Supplies browser sessions; one per stage run.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self) -> ScrapeResult<Arc<dyn BrowserSession>>;
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeSessionProvider;

#[cfg(not(feature = "browser"))]
impl ChromeSessionProvider {
    pub fn new(_config: BrowserConfig, _base_url: impl Into<String>) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionProvider for ChromeSessionProvider {
    async fn open(&self) -> ScrapeResult<Arc<dyn BrowserSession>> {
        Err(ScrapeError::Session(
            "Browser support not compiled. Rebuild with: cargo build --features browser".to_string(),
        ))
    }
}

/// Open a page, navigate to `url`, run `body`, and close the page on every
/// exit path.
pub async fn with_page<T, F, Fut>(session: &dyn BrowserSession, url: &str, body: F) -> ScrapeResult<T>
where
    F: FnOnce(Arc<dyn PageHandle>) -> Fut,
    Fut: Future<Output = ScrapeResult<T>>,
{
    let page = session.new_page().await?;
    let result = match page.goto(url).await {
        Ok(()) => body(page.clone()).await,
        Err(e) => Err(e),
    };
    if let Err(e) = page.close().await {
        warn!(url, "Failed to close page: {}", e);
    }
    result
}

/// Open a session, run `body`, and close the session on every exit path.
///
/// A failure to open is reported as [`ScrapeError::Session`].
pub async fn with_session<T, F, Fut>(provider: &dyn SessionProvider, body: F) -> ScrapeResult<T>
where
    F: FnOnce(Arc<dyn BrowserSession>) -> Fut,
    Fut: Future<Output = ScrapeResult<T>>,
{
    let session = provider.open().await.map_err(|e| match e {
        ScrapeError::Session(_) => e,
        other => ScrapeError::Session(other.to_string()),
    })?;
    let result = body(session.clone()).await;
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
    } else {
        debug!("Browser session closed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPage {
        closed: AtomicUsize,
        fail_goto: bool,
    }

    #[async_trait]
    impl PageHandle for CountingPage {
        async fn goto(&self, url: &str) -> ScrapeResult<()> {
            if self.fail_goto {
                return Err(ScrapeError::Timeout {
                    url: url.to_string(),
                    seconds: 1,
                });
            }
            Ok(())
        }

        async fn url(&self) -> String {
            "https://example.com".to_string()
        }

        async fn evaluate(&self, _script: &str) -> ScrapeResult<serde_json::Value> {
            Ok(serde_json::json!(640.0))
        }

        async fn close(&self) -> ScrapeResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct OnePageSession {
        page: Arc<CountingPage>,
    }

    #[async_trait]
    impl BrowserSession for OnePageSession {
        async fn new_page(&self) -> ScrapeResult<Arc<dyn PageHandle>> {
            Ok(self.page.clone())
        }

        async fn close(&self) -> ScrapeResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_with_page_closes_after_body_error() {
        let page = Arc::new(CountingPage::default());
        let session = OnePageSession { page: page.clone() };

        let result: ScrapeResult<()> = with_page(&session, "https://example.com", |_| async {
            Err(ScrapeError::extraction("https://example.com", "no rows"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_page_closes_after_navigation_timeout() {
        let page = Arc::new(CountingPage {
            fail_goto: true,
            ..Default::default()
        });
        let session = OnePageSession { page: page.clone() };

        let result = with_page(&session, "https://example.com", |_| async { Ok(1) }).await;

        assert!(matches!(result, Err(ScrapeError::Timeout { .. })));
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_scroll_extent_reads_number() {
        let page = CountingPage::default();
        assert_eq!(page.scroll_extent().await.unwrap(), 640.0);
    }
}
