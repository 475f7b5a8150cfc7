use crate::actions::BrowserActions;
use crate::backend::{SessionBackend, SessionHandle, SessionSpec};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches one Chromium process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumBackend {
    executable: Option<PathBuf>,
}

impl ChromiumBackend {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn browser_config(&self, spec: &SessionSpec) -> Result<BrowserConfig> {
        let fingerprint = &spec.fingerprint;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&spec.profile_dir)
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .request_timeout(spec.navigation_timeout)
            .arg(fingerprint.lang_arg())
            .arg("--disable-blink-features=AutomationControlled");

        if !spec.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(BrowserError::ChromiumError)
    }
}

#[async_trait::async_trait]
impl SessionBackend for ChromiumBackend {
    async fn launch(&self, spec: &SessionSpec) -> Result<Box<dyn SessionHandle>> {
        let config = self.browser_config(spec)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = match prepare_page(&browser, spec).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            browser: Mutex::new(browser),
            page,
            navigation_timeout: spec.navigation_timeout,
            handler_task,
        }))
    }
}

async fn prepare_page(browser: &Browser, spec: &SessionSpec) -> Result<Page> {
    let fingerprint = &spec.fingerprint;
    let chromium = |e: chromiumoxide::error::CdpError| BrowserError::ChromiumError(e.to_string());

    let page = browser.new_page("about:blank").await.map_err(chromium)?;
    page.execute(SetUserAgentOverrideParams::new(
        fingerprint.user_agent.clone(),
    ))
    .await
    .map_err(chromium)?;
    page.execute(SetTimezoneOverrideParams::new(fingerprint.timezone.clone()))
        .await
        .map_err(chromium)?;
    page.execute(SetLocaleOverrideParams {
        locale: Some(fingerprint.locale.clone()),
    })
    .await
    .map_err(chromium)?;
    page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
        fingerprint.stealth_script(),
    ))
    .await
    .map_err(chromium)?;

    Ok(page)
}

/// A Chromium process with one prepared page.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    navigation_timeout: Duration,
    handler_task: JoinHandle<()>,
}

#[async_trait::async_trait]
impl BrowserActions for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {} s",
                self.navigation_timeout.as_secs()
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::SelectorNotFound(selector.to_string()));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(text.unwrap_or_default())
    }

    async fn page_content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionHandle for ChromiumSession {
    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            debug!("closing page failed: {}", e);
        }

        let mut browser = self.browser.lock().await;
        let result = match browser.close().await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("closing browser failed, killing process: {}", e);
                if let Some(Err(e)) = browser.kill().await {
                    warn!("killing browser failed: {}", e);
                }
                Err(BrowserError::ChromiumError(e.to_string()))
            }
        };
        if let Err(e) = browser.wait().await {
            debug!("waiting for browser exit failed: {}", e);
        }
        self.handler_task.abort();
        result
    }
}
