//! rpc-lens — an intercepting proxy for JSON-RPC over HTTP.
//!
//! Each exchange is buffered into a [`flow::Flow`] and run through a
//! [`hooks::HookChain`]. The [`pipeline::JsonRpcInterceptor`] hook extracts
//! method names, decodes `eth_sendRawTransaction` payloads and collects
//! results into the flow's metadata; forwarded bytes are never modified.

pub mod body;
pub mod config;
pub mod flow;
pub mod flow_log;
pub mod forward;
pub mod hooks;
pub mod methods;
pub mod pipeline;
pub mod proxy;
pub mod results;
pub mod tx;
pub mod types;
