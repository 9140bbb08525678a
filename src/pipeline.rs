//! JSON-RPC interception pipeline — extracts methods, decoded raw
//! transactions and results from a flow without touching its bytes.
//!
//! Both phases are pure functions of the flow's headers and bodies, so
//! running them again over the same flow yields the same metadata. Parse
//! and decode failures only ever drop the affected fact.

use crate::body::parse_json_body;
use crate::flow::{Flow, ResponseFacts};
use crate::hooks::FlowHook;
use crate::methods::{extract_methods, raw_transactions};
use crate::results::extract_results;
use crate::tx::{decode_raw_transaction, DecodedTransaction};
use crate::types::SEND_RAW_TRANSACTION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Echoed from request to response when present.
pub const JSON_RPC_METHOD_HEADER: HeaderName = HeaderName::from_static("json-rpc-method");
pub const PATH_HEADER: HeaderName = HeaderName::from_static("x-json-rpc-path");
pub const TX_HASH_HEADER: HeaderName = HeaderName::from_static("x-json-rpc-tx-hash");

/// Facts derived from a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFacts {
    pub methods: Option<BTreeSet<String>>,
    pub decoded_tx: Option<DecodedTransaction>,
}

/// Inspect a request. Non-JSON or method-less bodies yield no facts.
pub fn inspect_request(headers: &HeaderMap, body: &[u8]) -> RequestFacts {
    let Some(json) = parse_json_body(headers, body) else {
        return RequestFacts::default();
    };

    let methods = extract_methods(&json);
    if methods.is_empty() {
        return RequestFacts::default();
    }

    let decoded_tx = if methods.contains(SEND_RAW_TRANSACTION) {
        first_decodable(raw_transactions(&json))
    } else {
        None
    };

    RequestFacts {
        methods: Some(methods),
        decoded_tx,
    }
}

/// Decode the first raw transaction that decodes; report every failure.
fn first_decodable(raw: Vec<&str>) -> Option<DecodedTransaction> {
    for (index, payload) in raw.into_iter().enumerate() {
        match decode_raw_transaction(payload) {
            Ok(tx) => {
                debug!(hash = ?tx.hash, tx_type = %tx.tx_type, "Decoded raw transaction");
                return Some(tx);
            }
            Err(e) => {
                warn!(
                    error = %e,
                    call_index = index,
                    payload_len = payload.len(),
                    "Failed to decode eth_sendRawTransaction payload"
                );
            }
        }
    }
    None
}

/// Inspect a response. `None` when the body is not JSON.
pub fn inspect_response(headers: &HeaderMap, body: &[u8]) -> Option<ResponseFacts> {
    parse_json_body(headers, body).map(|json| ResponseFacts::Results(extract_results(&json)))
}

/// Hook applying [`inspect_request`] and [`inspect_response`] to flows.
pub struct JsonRpcInterceptor {
    annotate_headers: bool,
}

impl JsonRpcInterceptor {
    pub fn new(annotate_headers: bool) -> Self {
        Self { annotate_headers }
    }
}

impl FlowHook for JsonRpcInterceptor {
    fn name(&self) -> &'static str {
        "json-rpc"
    }

    fn request(&self, flow: &mut Flow) {
        let facts = inspect_request(&flow.request.headers, &flow.request.body);
        flow.metadata.methods = facts.methods;
        flow.metadata.decoded_tx = facts.decoded_tx;
    }

    fn response(&self, flow: &mut Flow) {
        let Some(response) = flow.response.as_mut() else {
            info!(flow_id = flow.id, url = %flow.request.url, "No response from upstream");
            flow.metadata.response = Some(ResponseFacts::NoResponse);
            return;
        };

        if let Some(method) = flow.request.headers.get(&JSON_RPC_METHOD_HEADER) {
            response.headers.insert(JSON_RPC_METHOD_HEADER, method.clone());
        }

        flow.metadata.response = inspect_response(&response.headers, &response.body);

        if self.annotate_headers {
            if let Some(value) = flow
                .metadata
                .path()
                .and_then(|path| HeaderValue::from_str(&path).ok())
            {
                response.headers.insert(PATH_HEADER, value);
            }
            if let Some(tx) = &flow.metadata.decoded_tx {
                if let Ok(value) = HeaderValue::from_str(&format!("{:?}", tx.hash)) {
                    response.headers.insert(TX_HASH_HEADER, value);
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
