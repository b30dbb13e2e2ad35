//! Dry-run transport: prints each payload as one JSON line on stdout.

use std::io::{self, Write};

use telemetry_core::{OutboundRequest, Transport, TransportError};
use telemetry_protocol::ServerAck;

#[derive(Debug, Default, Clone, Copy)]
pub struct PrintTransport;

impl PrintTransport {
    pub fn render(request: &OutboundRequest) -> Result<String, TransportError> {
        let body = request
            .payload
            .to_body()
            .map_err(|e| TransportError::Payload(e.to_string()))?;
        String::from_utf8(body).map_err(|e| TransportError::Payload(e.to_string()))
    }
}

impl Transport for PrintTransport {
    fn send(&self, request: &OutboundRequest) -> Result<Option<ServerAck>, TransportError> {
        let line = Self::render(request)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line).map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use telemetry_core::{EventMeta, EventPayload};

    #[test]
    fn renders_payload_as_single_json_line() {
        let request = OutboundRequest {
            endpoint: None,
            payload: EventPayload {
                last_action: Some("search".into()),
                action: "view_record".into(),
                lang: Some("nb_NO".into()),
                logged_in: true,
                data: json!({ "record": { "id": "rec-1" } }),
                meta: EventMeta {
                    trail_step: 1,
                    prep_time: 10,
                    load_time: 20,
                    client_version: None,
                },
                session_id: "s-1".into(),
                session_start: "2026-03-01T08:00:00Z".into(),
                action_no: 4,
                hist: 2,
            },
        };

        let line = PrintTransport::render(&request).unwrap();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["action"], "view_record");
        assert_eq!(parsed["action_no"], 4);
    }
}
