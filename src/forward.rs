//! Destination port rewrite for every forwarded request.

use crate::flow::Flow;
use crate::hooks::FlowHook;
use tracing::warn;

pub struct PortForward {
    port: u16,
}

impl PortForward {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl FlowHook for PortForward {
    fn name(&self) -> &'static str {
        "port-forward"
    }

    fn request(&self, flow: &mut Flow) {
        if flow.request.url.set_port(Some(self.port)).is_err() {
            warn!(
                flow_id = flow.id,
                url = %flow.request.url,
                port = self.port,
                "Destination cannot carry a port, leaving it unchanged"
            );
        }
    }
}
