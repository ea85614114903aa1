//! Injection probes.
//!
//! Every probe is sequential: one request is in flight at a time and every
//! signal is reported through a [`FindingSink`] the moment it is seen.

use crate::finding::{Finding, VulnerabilityKind};
use crate::payloads::{SQLI_PAYLOADS, auth_bypass_bodies, nosql_payloads};
use breach_scanner::{ApiCall, CrawlResult, FetchEngine, Form, ProbeRequest, ProbeResponse};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

const NOSQL_BYPASS_MARKERS: [&str; 4] = ["token", "success", "auth", "id"];
const NOSQL_ERROR_MARKERS: [&str; 2] = ["mongo", "referenceerror"];
const AUTH_URL_MARKERS: [&str; 4] = ["login", "auth", "signin", "session"];
const AUTH_BYPASS_PARAMETER: &str = "JSON Body";

/// Receives findings as the probes produce them.
pub trait FindingSink {
    fn emit(&mut self, finding: Finding);
}

impl FindingSink for Vec<Finding> {
    fn emit(&mut self, finding: Finding) {
        self.push(finding);
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Responses slower than this count as a timing signal.
    pub delay_threshold: Duration,
    /// Value placed in every field that is not under test.
    pub neutral_value: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            delay_threshold: Duration::from_secs(2),
            neutral_value: "test".to_string(),
        }
    }
}

pub struct Injector<'a, E: FetchEngine> {
    engine: &'a E,
    config: ProbeConfig,
}

impl<'a, E: FetchEngine> Injector<'a, E> {
    pub fn new(engine: &'a E, config: ProbeConfig) -> Self {
        Self { engine, config }
    }

    /// Run every probe against a crawl result, in order.
    pub async fn probe_all<S: FindingSink>(&self, surface: &CrawlResult, sink: &mut S) {
        self.probe_forms(&surface.forms, sink).await;
        self.probe_api_sqli(&surface.api_calls, sink).await;
        self.probe_nosql(&surface.api_calls, sink).await;
        self.probe_auth_bypass(&surface.api_calls, sink).await;
    }

    async fn try_submit(&self, request: &ProbeRequest) -> Option<ProbeResponse> {
        match self.engine.submit(request).await {
            Ok(response) => Some(response),
            Err(e) => {
                debug!("{} {} failed: {}", request.method, request.url, e);
                None
            }
        }
    }

    fn form_fields(&self, form: &Form, target: Option<(&str, &str)>) -> Vec<(String, String)> {
        form.input_names()
            .map(|name| {
                let value = match target {
                    Some((field, payload)) if field == name => payload.to_string(),
                    _ => self.config.neutral_value.clone(),
                };
                (name.to_string(), value)
            })
            .collect()
    }

    /// Differential SQL injection against forms: a field is flagged when its
    /// response body differs from the neutral baseline or arrives too slowly.
    pub async fn probe_forms<S: FindingSink>(&self, forms: &[Form], sink: &mut S) {
        info!("Probing {} forms for SQL injection", forms.len());

        for form in forms {
            let baseline_request =
                ProbeRequest::form(form.method, &form.url, self.form_fields(form, None));
            let Some(baseline) = self.try_submit(&baseline_request).await else {
                debug!("No baseline for {} {}, skipping form", form.method, form.url);
                continue;
            };

            for field in form.input_names() {
                for &payload in SQLI_PAYLOADS {
                    let request = ProbeRequest::form(
                        form.method,
                        &form.url,
                        self.form_fields(form, Some((field, payload))),
                    );
                    let Some(response) = self.try_submit(&request).await else {
                        continue;
                    };

                    if response.body != baseline.body
                        || response.elapsed > self.config.delay_threshold
                    {
                        debug!("{} reacted to {:?} on {}", form.url, payload, field);
                        sink.emit(Finding::new(VulnerabilityKind::SqlInjection, &form.url, field));
                        break;
                    }
                }
            }
        }
    }

    /// Blind SQL injection against JSON APIs, detected by latency or a 5xx.
    pub async fn probe_api_sqli<S: FindingSink>(&self, calls: &[ApiCall], sink: &mut S) {
        let targets: Vec<(&ApiCall, &Map<String, Value>)> = json_object_targets(calls).collect();
        info!("Probing {} API endpoints for blind SQL injection", targets.len());

        for (call, body) in targets {
            let baseline = ProbeRequest::json(&call.method, &call.url, Value::Object(body.clone()));
            if self.try_submit(&baseline).await.is_none() {
                debug!("No baseline for {} {}, skipping endpoint", call.method, call.url);
                continue;
            }

            for key in body.keys() {
                for &payload in SQLI_PAYLOADS {
                    let mutated = with_key(body, key, Value::String(payload.to_string()));
                    let request = ProbeRequest::json(&call.method, &call.url, mutated);
                    let Some(response) = self.try_submit(&request).await else {
                        continue;
                    };

                    if response.elapsed > self.config.delay_threshold || response.is_server_error() {
                        sink.emit(Finding::new(VulnerabilityKind::BlindSqlInjection, &call.url, key));
                        break;
                    }
                }
            }
        }
    }

    /// Operator injection: each key's value is replaced wholesale.
    pub async fn probe_nosql<S: FindingSink>(&self, calls: &[ApiCall], sink: &mut S) {
        let targets: Vec<(&ApiCall, &Map<String, Value>)> = json_object_targets(calls).collect();
        info!("Probing {} API endpoints for NoSQL injection", targets.len());

        let payloads = nosql_payloads();
        for (call, body) in targets {
            for key in body.keys() {
                for payload in &payloads {
                    let mutated = with_key(body, key, payload.to_value());
                    let request = ProbeRequest::json(&call.method, &call.url, mutated);
                    let Some(response) = self.try_submit(&request).await else {
                        continue;
                    };

                    if let Some(kind) = classify_nosql(&response) {
                        debug!("{} on {} with {}", kind, key, payload.describe());
                        sink.emit(Finding::new(kind, &call.url, key));
                        break;
                    }
                }
            }
        }
    }

    /// Crafted login bodies against auth-looking POST endpoints. The first
    /// success ends the whole phase.
    pub async fn probe_auth_bypass<S: FindingSink>(&self, calls: &[ApiCall], sink: &mut S) {
        let candidates: Vec<&ApiCall> = calls
            .iter()
            .filter(|call| call.method == "POST")
            .filter(|call| {
                let url = call.url.to_lowercase();
                AUTH_URL_MARKERS.iter().any(|marker| url.contains(marker))
            })
            .collect();
        info!("Probing {} auth endpoints for bypass", candidates.len());

        let bodies = auth_bypass_bodies();
        for call in candidates {
            for body in &bodies {
                let request = ProbeRequest::json("POST", &call.url, body.clone());
                let Some(response) = self.try_submit(&request).await else {
                    continue;
                };

                if response.status == 200 && response.body.to_lowercase().contains("token") {
                    sink.emit(Finding::new(
                        VulnerabilityKind::AuthBypass,
                        &call.url,
                        AUTH_BYPASS_PARAMETER,
                    ));
                    return;
                }
            }
        }
    }
}

fn json_object_targets(calls: &[ApiCall]) -> impl Iterator<Item = (&ApiCall, &Map<String, Value>)> {
    calls
        .iter()
        .filter(|call| call.accepts_json_object())
        .filter_map(|call| call.body.as_object().map(|body| (call, body)))
}

fn with_key(body: &Map<String, Value>, key: &str, value: Value) -> Value {
    let mut mutated = body.clone();
    mutated.insert(key.to_string(), value);
    Value::Object(mutated)
}

fn classify_nosql(response: &ProbeResponse) -> Option<VulnerabilityKind> {
    let body = response.body.to_lowercase();
    if response.status == 200 && NOSQL_BYPASS_MARKERS.iter().any(|m| body.contains(m)) {
        Some(VulnerabilityKind::NoSqlBypass)
    } else if NOSQL_ERROR_MARKERS.iter().any(|m| body.contains(m)) {
        Some(VulnerabilityKind::NoSqlError)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn response(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            status,
            body: body.to_string(),
            headers: BTreeMap::new(),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_classify_nosql() {
        assert_eq!(
            classify_nosql(&response(200, r#"{"Token":"abc"}"#)),
            Some(VulnerabilityKind::NoSqlBypass)
        );
        assert_eq!(
            classify_nosql(&response(500, "MongoServerError: bad $where")),
            Some(VulnerabilityKind::NoSqlError)
        );
        assert_eq!(
            classify_nosql(&response(200, "ReferenceError: sleep is not defined")),
            Some(VulnerabilityKind::NoSqlError)
        );
        assert_eq!(classify_nosql(&response(401, r#"{"token":null}"#)), None);
        assert_eq!(classify_nosql(&response(200, "nope")), None);
    }

    #[test]
    fn test_with_key_replaces_one_value() {
        let body: Map<String, Value> =
            serde_json::from_str(r#"{"user":"a","pass":"b"}"#).unwrap();
        let mutated = with_key(&body, "pass", serde_json::json!({"$ne": null}));

        assert_eq!(mutated, serde_json::json!({"user": "a", "pass": {"$ne": null}}));
        assert_eq!(body.get("pass"), Some(&Value::String("b".to_string())));
    }
}
