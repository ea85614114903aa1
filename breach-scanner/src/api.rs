use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Request body of an intercepted API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsonBody {
    /// A JSON object, the only shape the injection probes mutate.
    Object(Map<String, Value>),
    /// Any other valid JSON document (array, string, number, ...).
    Scalar(Value),
    /// Body that was not valid JSON, kept verbatim.
    Raw(String),
    Empty,
}

impl JsonBody {
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return JsonBody::Empty;
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => JsonBody::Object(map),
            Ok(other) => JsonBody::Scalar(other),
            Err(_) => JsonBody::Raw(raw.to_string()),
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            JsonBody::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            JsonBody::Object(map) => Value::Object(map.clone()),
            JsonBody::Scalar(value) => value.clone(),
            JsonBody::Raw(raw) => Value::String(raw.clone()),
            JsonBody::Empty => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: JsonBody,
}

impl ApiCall {
    pub fn new(url: impl Into<String>, method: &str, body: JsonBody) -> Self {
        Self {
            url: url.into(),
            method: method.to_uppercase(),
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// POST/PUT endpoints carrying a JSON object are the ones worth mutating.
    pub fn accepts_json_object(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT") && self.body.as_object().is_some()
    }
}

/// Discovered API calls, deduplicated by URL.
///
/// A later capture for the same URL replaces the earlier one but keeps its
/// position, so iteration order is first-discovery order.
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    calls: Vec<ApiCall>,
    index: HashMap<String, usize>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, call: ApiCall) {
        match self.index.get(&call.url) {
            Some(&pos) => self.calls[pos] = call,
            None => {
                self.index.insert(call.url.clone(), self.calls.len());
                self.calls.push(call);
            }
        }
    }

    /// Insert only when nothing is known about the URL yet.
    pub fn insert_if_absent(&mut self, call: ApiCall) {
        if !self.index.contains_key(&call.url) {
            self.insert(call);
        }
    }

    pub fn into_vec(self) -> Vec<ApiCall> {
        self.calls
    }
}

/// Flatten a DevTools header object into lowercase names. Non-string values
/// keep their JSON rendering.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn headers_from_json(headers: &Value) -> BTreeMap<String, String> {
    headers
        .as_object()
        .map(|object| {
            object
                .iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.to_lowercase(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}
