//! Network send for assembled payloads.
//!
//! The pipeline only builds an `OutboundRequest`; a `Transport` decides how it
//! leaves the process. Sends run on a detached worker thread and their errors
//! are logged, never retried.

use std::sync::Mutex;

use telemetry_protocol::{parse_ack, EventPayload, ServerAck};
use tracing::debug;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub endpoint: Option<String>,
    pub payload: EventPayload,
}

pub trait Transport: Send + Sync {
    /// Sends one request. `Ok(Some(_))` when the collector answered with session values.
    fn send(&self, request: &OutboundRequest) -> Result<Option<ServerAck>, TransportError>;
}

/// JSON POST over HTTP(S).
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> Result<Option<ServerAck>, TransportError> {
        let Some(endpoint) = request.endpoint.as_deref() else {
            debug!(action = %request.payload.action, "No endpoint configured; dropping payload");
            return Ok(None);
        };

        let body = request
            .payload
            .to_body()
            .map_err(|e| TransportError::Payload(e.to_string()))?;

        let response = self
            .agent
            .post(endpoint)
            .header("content-type", "application/json")
            .send(&body[..])
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| TransportError::Request(format!("Failed to read response: {}", e)))?;

        Ok(parse_ack(&text))
    }
}

/// Builds payloads but never sends them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, request: &OutboundRequest) -> Result<Option<ServerAck>, TransportError> {
        debug!(action = %request.payload.action, "Null transport; payload not sent");
        Ok(None)
    }
}

/// Keeps every request in memory and answers with a fixed acknowledgement.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<OutboundRequest>>,
    ack: Option<ServerAck>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ack(ack: ServerAck) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            ack: Some(ack),
        }
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn payloads(&self) -> Vec<EventPayload> {
        self.sent().into_iter().map(|r| r.payload).collect()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: &OutboundRequest) -> Result<Option<ServerAck>, TransportError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::Request("memory transport poisoned".to_string()))?;
        sent.push(request.clone());
        Ok(self.ack.clone())
    }
}
