//! Fetch/render engines.
//!
//! The crawler and the injection probes only talk to a [`FetchEngine`]: fetch a
//! page (optionally with the API calls the page made while loading), submit a
//! crafted request, and release whatever session the engine holds.

use crate::api::ApiCall;
use crate::error::{Result, ScanError};
use crate::form::HttpMethod;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "Breach/0.1 (https://github.com/trapdoorsec/breach)";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub bearer_token: Option<String>,
    pub max_redirects: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bearer_token: None,
            max_redirects: 5,
        }
    }
}

impl EngineConfig {
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

/// A page as the engine saw it after loading.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    /// Markup to extract from. Empty for non-HTML responses.
    pub markup: String,
    /// XHR/fetch requests observed while the page loaded.
    pub api_calls: Vec<ApiCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitBody {
    /// Form fields; sent as a query string for GET, urlencoded otherwise.
    Form(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRequest {
    pub method: String,
    pub url: String,
    pub body: SubmitBody,
}

impl ProbeRequest {
    pub fn form(method: HttpMethod, url: &str, fields: Vec<(String, String)>) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: url.to_string(),
            body: SubmitBody::Form(fields),
        }
    }

    pub fn json(method: &str, url: &str, body: Value) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            body: SubmitBody::Json(body),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub elapsed: Duration,
}

impl ProbeResponse {
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

pub trait FetchEngine: Send + Sync {
    /// Load a page. Transport and timeout failures surface as errors; the
    /// caller decides whether they are fatal.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<RenderedPage>> + Send;

    /// Issue a single write request and time it.
    fn submit(&self, request: &ProbeRequest) -> impl Future<Output = Result<ProbeResponse>> + Send;

    /// Tear down any session held by the engine. Safe to call once after any
    /// sequence of failures.
    fn release(&self) -> impl Future<Output = ()> + Send;
}

/// Plain HTTP engine: no script execution and no network side channel.
pub struct HttpEngine {
    client: Client,
}

impl HttpEngine {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = config.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| ScanError::Other(format!("Invalid bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

impl FetchEngine for HttpEngine {
    async fn fetch(&self, url: &str) -> Result<RenderedPage> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::transport(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(|e| ScanError::transport(url, e))?;

        Ok(RenderedPage {
            url: final_url,
            status,
            markup: if is_html { body } else { String::new() },
            api_calls: Vec::new(),
        })
    }

    async fn submit(&self, request: &ProbeRequest) -> Result<ProbeResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ScanError::Other(format!("Invalid method {}: {}", request.method, e)))?;

        let builder = match &request.body {
            SubmitBody::Form(fields) if method == Method::GET => {
                self.client.get(&request.url).query(fields)
            }
            SubmitBody::Form(fields) => self.client.request(method, &request.url).form(fields),
            SubmitBody::Json(body) => self.client.request(method, &request.url).json(body),
        };

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| ScanError::transport(&request.url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| ScanError::ParseError(format!("Unreadable body from {}: {}", request.url, e)))?;
        let elapsed = start.elapsed();

        debug!(
            "{} {} -> {} in {}ms",
            request.method,
            request.url,
            status,
            elapsed.as_millis()
        );

        Ok(ProbeResponse {
            status,
            body,
            headers,
            elapsed,
        })
    }

    async fn release(&self) {
        debug!("HTTP engine released");
    }
}
