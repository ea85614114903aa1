use crate::api::{ApiCall, ApiRegistry, JsonBody};
use crate::engine::FetchEngine;
use crate::error::{Result, ScanError};
use crate::extract::extract_page;
use crate::form::FormKey;
use crate::normalize::{canonicalize, is_same_origin, normalize_url};
use crate::result::CrawlResult;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Called with the number of pages visited so far and the URL about to be fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Same-origin crawler collecting forms and API calls.
///
/// Pages are fetched one at a time through the engine. The traversal is a
/// LIFO worklist so pages are explored depth-first in document order.
pub struct Crawler<'a, E: FetchEngine> {
    engine: &'a E,
    max_depth: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a, E: FetchEngine> Crawler<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            max_depth: DEFAULT_MAX_DEPTH,
            progress_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl from `base_url`. Only a base URL that cannot be crawled at all is
    /// an error; failures on individual pages prune that branch.
    pub async fn scan(&self, base_url: &str) -> Result<CrawlResult> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let start = canonicalize(&parsed)
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: not an http(s) URL", base_url)))?;
        let origin_host = parsed
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{}: missing host", base_url)))?
            .to_string();

        info!("Starting crawl of {} (max depth {})", start, self.max_depth);

        let mut worklist: Vec<(String, usize)> = vec![(start, 0)];
        let mut visited: HashSet<String> = HashSet::new();
        let mut result = CrawlResult::default();
        let mut form_keys: HashSet<FormKey> = HashSet::new();
        let mut apis = ApiRegistry::new();

        while let Some((url, depth)) = worklist.pop() {
            if depth > self.max_depth || visited.contains(&url) {
                continue;
            }

            visited.insert(url.clone());
            result.visited.push(url.clone());

            if let Some(ref callback) = self.progress_callback {
                callback(result.visited.len(), url.clone());
            }

            let page = match self.engine.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Crawl error for {}: {}", url, e);
                    continue;
                }
            };

            for call in page.api_calls {
                if !is_same_origin(&call.url, &origin_host) {
                    debug!("Ignoring third-party API call {}", call.url);
                    continue;
                }
                let url = normalize_url(&call.url).unwrap_or_else(|| call.url.clone());
                apis.insert(ApiCall { url, ..call });
            }

            let Ok(page_url) = Url::parse(&page.url) else {
                warn!("Engine reported unparsable URL {} for {}", page.url, url);
                continue;
            };
            if !is_same_origin(page_url.as_str(), &origin_host) {
                debug!("{} redirected off-origin to {}", url, page_url);
                continue;
            }
            if let Some(landed) = canonicalize(&page_url)
                && landed != url
                && visited.insert(landed.clone())
            {
                debug!("{} redirected to {}", url, landed);
                result.visited.push(landed);
            }

            let extract = extract_page(&page_url, &page.markup, &origin_host);
            debug!(
                "{}: {} forms, {} links, {} API literals",
                url,
                extract.forms.len(),
                extract.links.len(),
                extract.api_literals.len()
            );

            for form in extract.forms {
                if form_keys.insert(form.key()) {
                    result.forms.push(form);
                }
            }

            for literal in extract.api_literals {
                apis.insert_if_absent(ApiCall::new(literal, "GET", JsonBody::Empty));
            }

            if depth < self.max_depth {
                for link in extract.links.into_iter().rev() {
                    if !visited.contains(&link) {
                        worklist.push((link, depth + 1));
                    }
                }
            }
        }

        result.api_calls = apis.into_vec();

        info!(
            "Crawl complete. Visited {} pages, {} forms, {} API calls",
            result.visited.len(),
            result.forms.len(),
            result.api_calls.len()
        );

        Ok(result)
    }
}
