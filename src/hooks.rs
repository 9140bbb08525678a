//! The hook chain is the set of per-flow callbacks the proxy engine drives.
//!
//! Hooks run in registration order. The chain owns the flow's phase
//! transitions: `Idle → RequestSeen` after the request hooks and
//! `ResponseSeen → Done` around the response hooks.

use crate::config::Config;
use crate::flow::{Flow, FlowPhase};
use crate::flow_log::{FileSink, FlowLogger, FlowSink, TracingSink};
use crate::forward::PortForward;
use crate::pipeline::JsonRpcInterceptor;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub trait FlowHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn request(&self, _flow: &mut Flow) {}

    fn response(&self, _flow: &mut Flow) {}
}

#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn FlowHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: impl FlowHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn run_request(&self, flow: &mut Flow) {
        for hook in &self.hooks {
            debug!(flow_id = flow.id, hook = hook.name(), "request hook");
            hook.request(flow);
        }
        flow.set_phase(FlowPhase::RequestSeen);
    }

    pub fn run_response(&self, flow: &mut Flow) {
        if flow.phase() < FlowPhase::RequestSeen {
            warn!(flow_id = flow.id, "Response hooks invoked before request hooks");
        }
        flow.set_phase(FlowPhase::ResponseSeen);
        for hook in &self.hooks {
            debug!(flow_id = flow.id, hook = hook.name(), "response hook");
            hook.response(flow);
        }
        flow.set_phase(FlowPhase::Done);
    }
}

/// The chain the binary runs: port rewrite, flow logging, JSON-RPC interception.
pub fn default_chain(config: &Config) -> Result<HookChain> {
    let mut chain = HookChain::new();

    if config.forward_port != 0 {
        chain = chain.with(PortForward::new(config.forward_port));
    }

    let sink: Arc<dyn FlowSink> = match &config.flow_log_path {
        Some(path) => Arc::new(
            FileSink::open(path)
                .with_context(|| format!("Failed to open flow log {}", path.display()))?,
        ),
        None => Arc::new(TracingSink),
    };
    chain = chain.with(FlowLogger::new(sink));

    Ok(chain.with(JsonRpcInterceptor::new(config.annotate_headers)))
}
