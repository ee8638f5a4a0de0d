// spider_chrome re-exports chromiumoxide API
use super::session::{BrowsingSession, ElementInfo, ScrollMetrics};
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use futures::StreamExt;
use std::path::PathBuf;

/// Reads tag, document-relative rectangle, rendered state and own text of `this`.
///
/// Returned as a JSON string so the value always comes back by value.
const DESCRIBE_ELEMENT_JS: &str = r#"
    function() {
        const r = this.getBoundingClientRect();
        const s = window.getComputedStyle(this);
        const displayed = s.display !== 'none'
            && s.visibility !== 'hidden'
            && s.visibility !== 'collapse'
            && s.opacity !== '0';
        let text = '';
        for (const n of this.childNodes) {
            if (n.nodeType === Node.TEXT_NODE) text += n.textContent;
        }
        return JSON.stringify({
            tag: this.tagName.toLowerCase(),
            rect: {
                x: r.left + window.scrollX,
                y: r.top + window.scrollY,
                width: r.width,
                height: r.height,
            },
            displayed: displayed,
            text: text.trim().substring(0, 200),
        });
    }
"#;

const SCROLL_METRICS_JS: &str = r#"
    ({
        scrollHeight: document.body
            ? document.body.scrollHeight
            : document.documentElement.scrollHeight,
        viewportHeight: window.innerHeight,
    })
"#;

const LINK_TARGETS_JS: &str = r#"
    Array.from(document.querySelectorAll('a'))
        .map(a => a.href)
        .filter(href => typeof href === 'string' && href.length > 0)
"#;

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
}

/// Connection mode for Chrome browser
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

impl ChromeDriver {
    /// Helper method to get the current active page, excluding Chrome's new-tab-page
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to create page: {}", e)))
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory per session so parallel crawls don't share state
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                let temp_dir = std::env::temp_dir().join(format!("uihash-chrome-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    BrowserError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };

                config = config
                    .user_data_dir(&temp_dir)
                    .window_size(1920, 1080)
                    .arg("--log-level=3");

                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                }

                let config = config.build().map_err(|e| {
                    BrowserError::LaunchFailed(format!(
                        "{}. Install Chrome/Chromium or pass --chrome-path",
                        e
                    ))
                })?;

                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    BrowserError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Handle browser events
                    }
                });

                (browser, None)
            }
        };

        log::debug!("Chrome session ready");
        Ok(Self { browser, temp_dir })
    }

    /// Execute JavaScript and return a specific type
    pub async fn execute_script_typed<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Other(format!("Script execution failed: {}", e)))?;

        result
            .into_value()
            .map_err(|e| BrowserError::Other(format!("Failed to deserialize result: {}", e)))
    }

    /// Close the browser connection
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BrowsingSession for ChromeDriver {
    type Element = Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::NavigateParams;

        let page = self.get_active_page().await?;
        log::debug!("Navigating to {}", url);

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::NavigationFailed(format!("Invalid URL {}: {}", url, e)))?;

        let response = page.execute(params).await.map_err(|e| {
            let error_str = e.to_string();

            // "oneshot canceled" means the browser connection is gone
            if error_str.contains("oneshot canceled") {
                BrowserError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                BrowserError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e))
            }
        })?;

        if let Some(error_text) = response.result.error_text {
            return Err(BrowserError::NavigationFailed(format!(
                "Navigation error for {}: {}",
                url, error_text
            )));
        }

        Ok(())
    }

    async fn is_ready(&self) -> Result<bool> {
        self.execute_script_typed("document.readyState === 'complete'")
            .await
    }

    async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
        self.execute_script_typed(SCROLL_METRICS_JS).await
    }

    async fn scroll_offset(&self) -> Result<f64> {
        self.execute_script_typed("window.scrollY").await
    }

    async fn scroll_to(&self, offset: f64) -> Result<()> {
        let page = self.get_active_page().await?;
        page.evaluate(format!("window.scrollTo(0, {})", offset))
            .await
            .map_err(|e| BrowserError::Other(format!("Scroll failed: {}", e)))?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.get_active_page().await?;

        page.screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| BrowserError::Other(format!("Failed to take screenshot: {}", e)))
    }

    async fn root_element(&self) -> Result<Option<Element>> {
        let page = self.get_active_page().await?;
        for selector in ["body", "frameset", "html"] {
            if let Ok(element) = page.find_element(selector).await {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    async fn describe(&self, element: &Element) -> Result<ElementInfo> {
        let returned = element.call_js_fn(DESCRIBE_ELEMENT_JS, false).await?;
        let raw = returned
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::ElementNotFound("element description".to_string()))?;
        Ok(serde_json::from_str(raw)?)
    }

    async fn children(&self, element: &Element) -> Result<Vec<Element>> {
        Ok(element.find_elements(":scope > *").await?)
    }

    async fn link_targets(&self) -> Result<Vec<String>> {
        self.execute_script_typed(LINK_TARGETS_JS).await
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}
