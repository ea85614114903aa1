//! Headless Chromium engine.
//!
//! Pages are rendered with scripts enabled and every XHR/fetch request the
//! page issues while loading is captured. Probe submissions go through a plain
//! [`HttpEngine`] built from the same configuration.

use crate::api::{ApiCall, JsonBody, headers_from_json};
use crate::engine::{EngineConfig, FetchEngine, HttpEngine, ProbeRequest, ProbeResponse, RenderedPage};
use crate::error::{Result, ScanError};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Time given to a loaded page to fire its background requests.
const SETTLE_TIME: Duration = Duration::from_millis(1500);

pub struct BrowserEngine {
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    http: HttpEngine,
    bearer_token: Option<String>,
    timeout: Duration,
}

fn browser_error(err: impl std::fmt::Display) -> ScanError {
    ScanError::BrowserError(err.to_string())
}

impl BrowserEngine {
    pub async fn launch(config: &EngineConfig) -> Result<Self> {
        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", config.user_agent))
            .request_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(browser_error)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(browser_error)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        info!("Headless browser launched");

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler,
            http: HttpEngine::new(config)?,
            bearer_token: config.bearer_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl FetchEngine for BrowserEngine {
    async fn fetch(&self, url: &str) -> Result<RenderedPage> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScanError::BrowserError("browser already released".to_string()))?;

        let page = browser.new_page("about:blank").await.map_err(browser_error)?;

        if let Some(ref token) = self.bearer_token {
            let headers = Headers::new(serde_json::json!({
                "Authorization": format!("Bearer {}", token.trim())
            }));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(browser_error)?;
        }

        let mut events = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(browser_error)?;

        let captured: Arc<Mutex<Vec<ApiCall>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let collector = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if !matches!(event.r#type, Some(ResourceType::Xhr | ResourceType::Fetch)) {
                    continue;
                }
                let request = &event.request;
                let call = ApiCall::new(
                    request.url.clone(),
                    &request.method,
                    JsonBody::from_raw(request.post_data.as_deref()),
                )
                .with_headers(headers_from_json(request.headers.inner()));
                sink.lock().await.push(call);
            }
        });

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        let loaded = match tokio::time::timeout(self.timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ScanError::transport(url, e)),
            Err(_) => Err(ScanError::transport(url, "navigation timed out")),
        };

        let rendered = match loaded {
            Ok(()) => {
                tokio::time::sleep(SETTLE_TIME).await;
                let markup = page.content().await.map_err(browser_error);
                let final_url = page.url().await.ok().flatten();
                markup.map(|markup| (markup, final_url.unwrap_or_else(|| url.to_string())))
            }
            Err(e) => Err(e),
        };

        collector.abort();
        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }

        let (markup, final_url) = rendered?;
        let api_calls = std::mem::take(&mut *captured.lock().await);
        debug!("Rendered {}: {} bytes, {} API calls", url, markup.len(), api_calls.len());

        Ok(RenderedPage {
            url: final_url,
            status: 200,
            markup,
            api_calls,
        })
    }

    async fn submit(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        self.http.submit(request).await
    }

    async fn release(&self) {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return;
        };

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        info!("Headless browser released");
    }
}
