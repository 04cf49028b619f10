//! Sensitive field masking applied to every logged payload.
//!
//! A key is sensitive when its lower-cased form, with `_` and `-` removed,
//! contains one of [`SENSITIVE_PATTERNS`]. String values under such keys keep
//! their first four characters; values of four characters or fewer are
//! replaced entirely. Nested objects are walked recursively. Arrays under a
//! sensitive key have their string elements masked one level deep only.

use serde_json::{Map, Value};

pub const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "key",
    "token",
    "signature",
    "cvv",
    "cardnumber",
];

pub const REDACTED: &str = "***REDACTED***";

const VISIBLE_PREFIX: usize = 4;

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SENSITIVE_PATTERNS.iter().any(|p| normalized.contains(p))
}

/// Mask a single sensitive string
pub fn mask(value: &str) -> String {
    let len = value.chars().count();
    if len <= VISIBLE_PREFIX {
        return REDACTED.to_string();
    }
    let prefix: String = value.chars().take(VISIBLE_PREFIX).collect();
    format!("{}{}", prefix, "*".repeat(len - VISIBLE_PREFIX))
}

/// Return a redacted copy of `value`
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let redacted = if is_sensitive_key(key) {
                redact_sensitive(value)
            } else {
                redact(value)
            };
            (key.clone(), redacted)
        })
        .collect()
}

fn redact_sensitive(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask(s)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Value::String(mask(s)),
                    other => redact(other),
                })
                .collect(),
        ),
        other => redact(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_keys() {
        assert!(is_sensitive_key("password"));
        assert!(is_sensitive_key("razorpay_signature"));
        assert!(is_sensitive_key("card_number"));
        assert!(is_sensitive_key("cardNumber"));
        assert!(is_sensitive_key("API-Key"));
        assert!(!is_sensitive_key("order_id"));
        assert!(!is_sensitive_key("amount"));
    }

    #[test]
    fn test_mask_short_and_long() {
        assert_eq!(mask("123"), REDACTED);
        assert_eq!(mask("abcd"), REDACTED);
        assert_eq!(mask("4111111111111111"), "4111************");
        assert_eq!(mask("pässwörd"), "päss****");
    }

    #[test]
    fn test_redact_never_leaks_values() {
        let input = json!({
            "password": "hunter2hunter2",
            "token": "tok_live_abcdef",
            "secret": "s3cr3t-value",
            "signature": "9f86d081884c7d65",
            "cvv": "123",
            "cardNumber": "4111111111111111",
            "order_id": "order_123"
        });
        let output = redact(&input);
        let rendered = output.to_string();

        for leaked in [
            "hunter2hunter2",
            "tok_live_abcdef",
            "s3cr3t-value",
            "9f86d081884c7d65",
            "4111111111111111",
        ] {
            assert!(!rendered.contains(leaked), "{} leaked", leaked);
        }
        assert_eq!(output["cvv"], REDACTED);
        assert_eq!(output["password"], "hunt**********");
        assert_eq!(output["order_id"], "order_123");
    }

    #[test]
    fn test_redact_recurses_into_nested_objects() {
        let input = json!({
            "payment": {
                "card": { "card_number": "5555444433331111", "holder": "A. Kumar" },
                "attempts": [{ "token": "tok_abcdefgh" }]
            },
            "api_keys": ["rzp_live_123456", "abc"]
        });
        let output = redact(&input);

        assert_eq!(output["payment"]["card"]["card_number"], "5555************");
        assert_eq!(output["payment"]["card"]["holder"], "A. Kumar");
        assert_eq!(output["payment"]["attempts"][0]["token"], "tok_********");
        assert_eq!(output["api_keys"][0], "rzp_***********");
        assert_eq!(output["api_keys"][1], REDACTED);
    }

    #[test]
    fn test_non_string_values_pass_through() {
        let output = redact(&json!({ "key_count": 3, "token": null }));
        assert_eq!(output["key_count"], 3);
        assert_eq!(output["token"], Value::Null);
    }
}
