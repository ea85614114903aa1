use crate::api::ApiCall;
use crate::form::Form;
use serde::{Deserialize, Serialize};

/// Attack surface collected by one crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlResult {
    pub forms: Vec<Form>,
    pub api_calls: Vec<ApiCall>,
    /// Canonical URLs in the order they were visited.
    pub visited: Vec<String>,
}

impl CrawlResult {
    pub fn form_count(&self) -> usize {
        self.forms.len()
    }

    pub fn api_count(&self) -> usize {
        self.api_calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty() && self.api_calls.is_empty()
    }
}
