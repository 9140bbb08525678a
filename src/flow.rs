//! Flow model — one intercepted request/response exchange and the
//! facts extracted from it.
//!
//! The engine owns flows; hooks only read and mutate them. Extracted facts
//! live in a typed [`FlowMetadata`] and are rendered to the stable string
//! keys (`json-rpc-path`, `decoded-tx`, `json-rpc-response`) only when they
//! leave the process.

use crate::methods::join;
use crate::results::NO_RESPONSE;
use crate::tx::DecodedTransaction;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use reqwest::Url;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const PATH_KEY: &str = "json-rpc-path";
pub const DECODED_TX_KEY: &str = "decoded-tx";
pub const RESPONSE_KEY: &str = "json-rpc-response";

#[derive(Debug, Clone)]
pub struct FlowRequest {
    pub method: Method,
    /// Destination the request is forwarded to.
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct FlowResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Lifecycle of a flow as seen by the hook chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowPhase {
    Idle,
    RequestSeen,
    ResponseSeen,
    Done,
}

/// What the response phase observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFacts {
    /// Canonical `result`/`error` strings, or the "No result" sentinel.
    Results(BTreeSet<String>),
    /// Upstream produced no response at all.
    NoResponse,
}

impl ResponseFacts {
    pub fn render(&self) -> String {
        match self {
            ResponseFacts::Results(results) => join(results),
            ResponseFacts::NoResponse => NO_RESPONSE.to_string(),
        }
    }
}

/// Per-flow extracted facts. The request phase owns `methods` and
/// `decoded_tx`; the response phase owns `response`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMetadata {
    pub methods: Option<BTreeSet<String>>,
    pub decoded_tx: Option<DecodedTransaction>,
    pub response: Option<ResponseFacts>,
}

impl FlowMetadata {
    /// Comma-joined method names, if the request was JSON-RPC.
    pub fn path(&self) -> Option<String> {
        self.methods.as_ref().map(join)
    }

    /// Render to the stable string-keyed form consumed by sinks and display.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(path) = self.path() {
            map.insert(PATH_KEY.into(), Value::String(path));
        }
        if let Some(tx) = &self.decoded_tx {
            if let Ok(fields) = serde_json::to_value(tx) {
                map.insert(DECODED_TX_KEY.into(), fields);
            }
        }
        if let Some(response) = &self.response {
            map.insert(RESPONSE_KEY.into(), Value::String(response.render()));
        }
        map
    }
}

#[derive(Debug, Clone)]
pub struct Flow {
    /// Engine-assigned identifier, unique per process.
    pub id: u64,
    pub request: FlowRequest,
    /// `None` until the upstream answers, and forever if it never does.
    pub response: Option<FlowResponse>,
    pub metadata: FlowMetadata,
    phase: FlowPhase,
}

impl Flow {
    pub fn new(id: u64, request: FlowRequest) -> Self {
        Self {
            id,
            request,
            response: None,
            metadata: FlowMetadata::default(),
            phase: FlowPhase::Idle,
        }
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: FlowPhase) {
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::NO_RESULT;

    #[test]
    fn test_empty_metadata_renders_no_keys() {
        assert!(FlowMetadata::default().to_map().is_empty());
    }

    #[test]
    fn test_metadata_renders_stable_keys() {
        let metadata = FlowMetadata {
            methods: Some(["eth_call".to_string(), "eth_chainId".to_string()].into()),
            decoded_tx: None,
            response: Some(ResponseFacts::Results([NO_RESULT.to_string()].into())),
        };
        let map = metadata.to_map();
        assert_eq!(map[PATH_KEY], "eth_call,eth_chainId");
        assert_eq!(map[RESPONSE_KEY], NO_RESULT);
        assert!(!map.contains_key(DECODED_TX_KEY));
    }

    #[test]
    fn test_no_response_sentinel() {
        let metadata = FlowMetadata {
            response: Some(ResponseFacts::NoResponse),
            ..Default::default()
        };
        assert_eq!(metadata.to_map()[RESPONSE_KEY], "No response");
    }

    #[test]
    fn test_phase_order() {
        assert!(FlowPhase::Idle < FlowPhase::RequestSeen);
        assert!(FlowPhase::ResponseSeen < FlowPhase::Done);
    }
}
