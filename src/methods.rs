//! Method extraction for single and batched JSON-RPC request bodies.

use crate::body::rpc_objects;
use crate::types::SEND_RAW_TRANSACTION;
use serde_json::Value;
use std::collections::BTreeSet;

/// Distinct method names present in a request body.
///
/// Elements without a string `method` are ignored. The set is ordered so
/// joined output is stable across runs.
pub fn extract_methods(body: &Value) -> BTreeSet<String> {
    rpc_objects(body)
        .into_iter()
        .filter_map(|call| call.get("method").and_then(Value::as_str))
        .map(str::to_owned)
        .collect()
}

/// First param of every `eth_sendRawTransaction` call, in body order.
///
/// Calls whose first param is missing or not a string are skipped.
pub fn raw_transactions(body: &Value) -> Vec<&str> {
    rpc_objects(body)
        .into_iter()
        .filter(|call| call.get("method").and_then(Value::as_str) == Some(SEND_RAW_TRANSACTION))
        .filter_map(|call| {
            call.get("params")
                .and_then(Value::as_array)
                .and_then(|params| params.first())
                .and_then(Value::as_str)
        })
        .collect()
}

/// Comma-joined rendering used for the `json-rpc-path` fact.
pub fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
