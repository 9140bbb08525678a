//! Flow logging through an injected sink that receives one structured event per
//! phase (URL, method, headers, body).

use crate::flow::Flow;
use crate::hooks::FlowHook;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowEventPhase {
    Request,
    Response,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowEvent {
    pub timestamp: DateTime<Utc>,
    pub flow_id: u64,
    pub phase: FlowEventPhase,
    pub method: String,
    pub url: String,
    /// `None` on request events and on responses that never arrived.
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FlowEvent {
    pub fn request(flow: &Flow) -> Self {
        Self {
            timestamp: Utc::now(),
            flow_id: flow.id,
            phase: FlowEventPhase::Request,
            method: flow.request.method.to_string(),
            url: flow.request.url.to_string(),
            status: None,
            headers: header_strings(&flow.request.headers),
            body: String::from_utf8_lossy(&flow.request.body).into_owned(),
        }
    }

    pub fn response(flow: &Flow) -> Self {
        let (status, headers, body) = match &flow.response {
            Some(resp) => (
                Some(resp.status.as_u16()),
                header_strings(&resp.headers),
                String::from_utf8_lossy(&resp.body).into_owned(),
            ),
            None => (None, BTreeMap::new(), String::new()),
        };
        Self {
            timestamp: Utc::now(),
            flow_id: flow.id,
            phase: FlowEventPhase::Response,
            method: flow.request.method.to_string(),
            url: flow.request.url.to_string(),
            status,
            headers,
            body,
        }
    }
}

fn header_strings(headers: &axum::http::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

pub trait FlowSink: Send + Sync {
    fn record(&self, event: &FlowEvent);
}

/// Emits events through `tracing` at debug level.
pub struct TracingSink;

impl FlowSink for TracingSink {
    fn record(&self, event: &FlowEvent) {
        debug!(
            flow_id = event.flow_id,
            phase = ?event.phase,
            method = %event.method,
            url = %event.url,
            status = ?event.status,
            body_len = event.body.len(),
            "flow event"
        );
    }
}

/// Appends events to a file, one JSON object per line.
///
/// Lines are handed to a dedicated writer thread so request handlers never
/// wait on disk I/O. Dropping the sink drains pending lines.
pub struct FileSink {
    lines: Option<UnboundedSender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
}

impl FileSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = std::thread::Builder::new()
            .name("flow-log".into())
            .spawn(move || write_lines(LineWriter::new(file), rx))?;

        Ok(Self {
            lines: Some(tx),
            writer: Some(writer),
        })
    }
}

fn write_lines(mut out: impl Write, mut rx: UnboundedReceiver<Vec<u8>>) {
    while let Some(line) = rx.blocking_recv() {
        if let Err(e) = out.write_all(&line) {
            warn!(error = %e, "Failed to write flow log");
        }
    }
    if let Err(e) = out.flush() {
        warn!(error = %e, "Failed to flush flow log");
    }
}

impl FlowSink for FileSink {
    fn record(&self, event: &FlowEvent) {
        let mut line = match serde_json::to_vec(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(flow_id = event.flow_id, error = %e, "Failed to serialize flow event");
                return;
            }
        };
        line.push(b'\n');

        let sent = self.lines.as_ref().map(|tx| tx.send(line).is_ok());
        if sent != Some(true) {
            warn!(flow_id = event.flow_id, "Flow log writer stopped, dropping event");
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // closing the channel ends the writer loop
        self.lines.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("Flow log writer panicked");
            }
        }
    }
}

/// Hook that feeds every phase of every flow to a sink.
pub struct FlowLogger {
    sink: Arc<dyn FlowSink>,
}

impl FlowLogger {
    pub fn new(sink: Arc<dyn FlowSink>) -> Self {
        Self { sink }
    }
}

impl FlowHook for FlowLogger {
    fn name(&self) -> &'static str {
        "flow-logger"
    }

    fn request(&self, flow: &mut Flow) {
        self.sink.record(&FlowEvent::request(flow));
    }

    fn response(&self, flow: &mut Flow) {
        self.sink.record(&FlowEvent::response(flow));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{FlowRequest, FlowResponse};
    use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method, StatusCode};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        events: Mutex<Vec<FlowEvent>>,
    }

    impl FlowSink for MemorySink {
        fn record(&self, event: &FlowEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn make_flow() -> Flow {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Flow::new(
            3,
            FlowRequest {
                method: Method::POST,
                url: "http://127.0.0.1:8545/".parse().unwrap(),
                headers,
                body: r#"{"method":"eth_chainId"}"#.into(),
            },
        )
    }

    #[test]
    fn test_logger_records_both_phases() {
        let sink = Arc::new(MemorySink::default());
        let logger = FlowLogger::new(sink.clone());
        let mut flow = make_flow();

        logger.request(&mut flow);
        flow.response = Some(FlowResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: r#"{"result":"0x1"}"#.into(),
        });
        logger.response(&mut flow);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].phase, FlowEventPhase::Request);
        assert_eq!(events[0].method, "POST");
        assert_eq!(events[0].headers["content-type"], "application/json");
        assert_eq!(events[0].body, r#"{"method":"eth_chainId"}"#);
        assert_eq!(events[1].phase, FlowEventPhase::Response);
        assert_eq!(events[1].status, Some(200));
        assert_eq!(events[1].body, r#"{"result":"0x1"}"#);
    }

    #[test]
    fn test_missing_response_event() {
        let event = FlowEvent::response(&make_flow());
        assert_eq!(event.status, None);
        assert!(event.body.is_empty());
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.jsonl");
        let sink = FileSink::open(&path).unwrap();
        let flow = make_flow();

        sink.record(&FlowEvent::request(&flow));
        sink.record(&FlowEvent::response(&flow));
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["phase"], "request");
        assert_eq!(lines[0]["flow_id"], 3);
        assert_eq!(lines[1]["phase"], "response");
        assert!(lines[1]["status"].is_null());
    }

    #[tokio::test]
    async fn test_file_sink_records_from_async_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.jsonl");
        let sink: Arc<dyn FlowSink> = Arc::new(FileSink::open(&path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let logger = FlowLogger::new(sink.clone());
                tokio::spawn(async move {
                    logger.request(&mut make_flow());
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
        for line in contents.lines() {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(event["phase"], "request");
        }
    }
}
