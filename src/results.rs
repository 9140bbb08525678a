//! Result extraction for single and batched JSON-RPC response bodies.

use crate::body::rpc_objects;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reported when a parsed response carries neither `result` nor `error`.
pub const NO_RESULT: &str = "No result";

/// Reported when the upstream produced no response at all.
pub const NO_RESPONSE: &str = "No response";

/// Distinct `result`/`error` payloads, each serialized as canonical JSON.
///
/// Object keys are emitted in sorted order, so structurally equal payloads
/// map to the same string. When an object carries both fields, `error` is
/// kept. A body with no payload anywhere yields `{NO_RESULT}`.
pub fn extract_results(body: &Value) -> BTreeSet<String> {
    let mut results: BTreeSet<String> = rpc_objects(body)
        .into_iter()
        .filter_map(|reply| reply.get("error").or_else(|| reply.get("result")))
        .map(canonical)
        .collect();

    if results.is_empty() {
        results.insert(NO_RESULT.to_string());
    }
    results
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(obj) => {
            let ordered: BTreeMap<&String, Value> =
                obj.iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(ordered.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::join;
    use serde_json::json;

    #[test]
    fn test_single_result() {
        let results = extract_results(&json!({"jsonrpc": "2.0", "result": 42, "id": 1}));
        assert_eq!(results.into_iter().collect::<Vec<_>>(), vec!["42"]);
    }

    #[test]
    fn test_batch_results() {
        let results = extract_results(&json!([{"result": 1}, {"result": 2}]));
        assert_eq!(join(&results), "1,2");
    }

    #[test]
    fn test_string_results_keep_quotes() {
        let results = extract_results(&json!({"result": "0x10"}));
        assert!(results.contains("\"0x10\""));
    }

    #[test]
    fn test_error_wins_over_result() {
        let body = json!({"result": "0x1", "error": {"code": -32000, "message": "nonce too low"}});
        let results = extract_results(&body);
        assert_eq!(results.len(), 1);
        assert!(results.contains(r#"{"code":-32000,"message":"nonce too low"}"#));
    }

    #[test]
    fn test_object_keys_are_canonical() {
        let a = extract_results(&json!({"result": {"b": 1, "a": 2}}));
        let b = extract_results(&json!({"result": {"a": 2, "b": 1}}));
        assert_eq!(a, b);
        assert!(a.contains(r#"{"a":2,"b":1}"#));
    }

    #[test]
    fn test_null_result_is_a_result() {
        let results = extract_results(&json!({"result": null, "id": 1}));
        assert!(results.contains("null"));
    }

    #[test]
    fn test_absent_payload_yields_sentinel() {
        let results = extract_results(&json!({"jsonrpc": "2.0", "id": 1}));
        assert_eq!(join(&results), NO_RESULT);

        let results = extract_results(&json!([]));
        assert_eq!(join(&results), NO_RESULT);
    }

    #[test]
    fn test_duplicate_results_collapse() {
        let results = extract_results(&json!([{"result": "0x1"}, {"result": "0x1"}, {"result": "0x2"}]));
        assert_eq!(results.len(), 2);
    }
}
