//! Body parsing: turns buffered bytes into JSON when, and only when,
//! the message declares itself as JSON.
//!
//! Anything that is not JSON (HTML error pages, empty bodies, truncated
//! payloads) is reported as "not applicable" rather than as an error, so
//! callers can skip enrichment without touching the flow.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use serde_json::{Map, Value};

const JSON_MEDIA_TYPE: &str = "application/json";

/// Whether the headers declare an `application/json` body.
///
/// Media-type parameters such as `charset` are ignored and the comparison is
/// case-insensitive.
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Strictly decode `bytes` as JSON. `None` means "not applicable".
pub fn parse(bytes: &[u8]) -> Option<Value> {
    serde_json::from_slice(bytes).ok()
}

/// Content-Type gated parse, applied the same way to requests and responses.
pub fn parse_json_body(headers: &HeaderMap, bytes: &[u8]) -> Option<Value> {
    if !is_json_content_type(headers) {
        return None;
    }
    parse(bytes)
}

/// Objects of a single-or-batch JSON-RPC body, in body order.
///
/// A top-level object yields itself; an array yields its object elements and
/// skips everything else. Scalars yield nothing.
pub fn rpc_objects(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(obj) => vec![obj],
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_json_content_type_variants() {
        assert!(is_json_content_type(&headers_with("application/json")));
        assert!(is_json_content_type(&headers_with("application/json; charset=utf-8")));
        assert!(is_json_content_type(&headers_with("Application/JSON")));
        assert!(!is_json_content_type(&headers_with("text/html")));
        assert!(!is_json_content_type(&headers_with("application/jsonl")));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse(b"<html>502 Bad Gateway</html>").is_none());
        assert!(parse(b"").is_none());
        assert!(parse(b"{\"method\":").is_none());
        assert_eq!(parse(b"{\"a\":1}"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_gate_skips_json_without_header() {
        let body = br#"{"method":"eth_chainId"}"#;
        assert!(parse_json_body(&HeaderMap::new(), body).is_none());
        assert!(parse_json_body(&headers_with("text/plain"), body).is_none());
        assert!(parse_json_body(&headers_with("application/json"), body).is_some());
    }

    #[test]
    fn test_rpc_objects_shapes() {
        let single = json!({"method": "a"});
        assert_eq!(rpc_objects(&single).len(), 1);

        let batch = json!([{"method": "a"}, 7, "x", {"method": "b"}]);
        assert_eq!(rpc_objects(&batch).len(), 2);

        assert!(rpc_objects(&json!(42)).is_empty());
        assert!(rpc_objects(&json!([])).is_empty());
    }
}
