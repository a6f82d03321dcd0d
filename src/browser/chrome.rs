//! chromiumoxide (CDP) backed browser sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserConfig, BrowserSession, PageHandle, SessionProvider};
use crate::error::{ScrapeError, ScrapeResult};

/// Launches (or connects to) Chrome once per stage run.
pub struct ChromeSessionProvider {
    config: BrowserConfig,
    base_url: String,
}

impl ChromeSessionProvider {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into(),
        }
    }

    fn find_chrome(&self) -> ScrapeResult<PathBuf> {
        if let Some(ref path) = self.config.chrome_executable {
            return Ok(path.clone());
        }

        for path in Self::CHROME_PATHS {
            let p = Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(ScrapeError::Session(
            "Chrome/Chromium not found. Install it or set CHROME_EXECUTABLE".to_string(),
        ))
    }

    async fn launch(&self) -> ScrapeResult<(Browser, JoinHandle<()>)> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = self.find_chrome()?;
        let mut builder = CdpConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.config.viewport_width, self.config.viewport_height);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| ScrapeError::Session(format!("Failed to build browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to launch browser: {}", e)))?;

        Ok((browser, spawn_handler(handler)))
    }

    async fn connect_remote(&self, url: &str) -> ScrapeResult<(Browser, JoinHandle<()>)> {
        info!("Connecting to remote browser at {}", url);

        // WebSocket URL comes from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to reach remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| ScrapeError::Session(format!("Bad browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::Session("No webSocketDebuggerUrl in response".to_string()))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let (browser, handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to connect to remote browser: {}", e)))?;

        Ok((browser, spawn_handler(handler)))
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl SessionProvider for ChromeSessionProvider {
    async fn open(&self) -> ScrapeResult<Arc<dyn BrowserSession>> {
        let remote = self.config.remote_url.clone();
        let (browser, handler) = match remote {
            Some(ref url) => self.connect_remote(url).await?,
            None => self.launch().await?,
        };

        let session = ChromeSession {
            browser: Mutex::new(Some(browser)),
            handler,
            bootstrap: Mutex::new(None),
            remote: remote.is_some(),
            timeout: self.config.navigation_timeout(),
            viewport: (self.config.viewport_width, self.config.viewport_height),
        };

        // Warm the session on the landing page so consent and cookies settle
        // before stage pages open.
        let page = session.open_page().await?;
        if let Err(e) = page.goto(&self.base_url).await {
            let _ = page.close().await;
            let _ = session.close().await;
            return Err(ScrapeError::Session(format!("Bootstrap navigation failed: {}", e)));
        }
        *session.bootstrap.lock().await = Some(page);

        Ok(Arc::new(session))
    }
}

/// One running browser plus its bootstrap page.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    bootstrap: Mutex<Option<ChromePage>>,
    remote: bool,
    timeout: Duration,
    viewport: (u32, u32),
}

impl ChromeSession {
    async fn open_page(&self) -> ScrapeResult<ChromePage> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScrapeError::Session("Browser session already closed".to_string()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to open page: {}", e)))?;
        drop(guard);

        let (width, height) = self.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            width as i64,
            height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(|e| ScrapeError::Session(format!("Failed to set viewport: {}", e)))?;

        Ok(ChromePage {
            page,
            timeout: self.timeout,
            current_url: Mutex::new(String::from("about:blank")),
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&self) -> ScrapeResult<Arc<dyn PageHandle>> {
        Ok(Arc::new(self.open_page().await?))
    }

    async fn close(&self) -> ScrapeResult<()> {
        if let Some(page) = self.bootstrap.lock().await.take() {
            let _ = page.close().await;
        }

        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if !self.remote {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                let _ = browser.wait().await;
            }
        }
        self.handler.abort();
        Ok(())
    }
}

struct ChromePage {
    page: Page,
    timeout: Duration,
    current_url: Mutex<String>,
}

#[async_trait]
impl PageHandle for ChromePage {
    async fn goto(&self, url: &str) -> ScrapeResult<()> {
        debug!("Navigating to {}", url);
        *self.current_url.lock().await = url.to_string();

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScrapeError::extraction(url, format!("Invalid URL: {}", e)))?;

        let navigation = async {
            self.page.execute(params).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::extraction(url, e)),
            Err(_) => Err(ScrapeError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn url(&self) -> String {
        self.current_url.lock().await.clone()
    }

    async fn evaluate(&self, script: &str) -> ScrapeResult<serde_json::Value> {
        match tokio::time::timeout(self.timeout, self.page.evaluate(script.to_string())).await {
            Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(serde_json::Value::Null)),
            Ok(Err(e)) => Err(ScrapeError::extraction(self.url().await, e)),
            Err(_) => Err(ScrapeError::Timeout {
                url: self.url().await,
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn close(&self) -> ScrapeResult<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ScrapeError::Session(format!("Failed to close page: {}", e)))
    }
}
