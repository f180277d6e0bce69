//! Event envelope and the payload/command contracts.

use serde::{Deserialize, Serialize};

/// A payload that can live inside an [`Event`] envelope.
///
/// Payload types are closed tagged enums serialized as
/// `{"type": "...", "payload": {...}}`; `kind` exposes the tag for logging.
pub trait EventPayload {
    fn kind(&self) -> &'static str;
}

/// A command addressed to an aggregate. Every command carries the request id
/// that stamps the events it produces.
pub trait Command {
    fn request_id(&self) -> &str;
}

/// An immutable, versioned event record.
///
/// `version` starts at 1 and is contiguous per `aggregate_id`; ordering
/// within an aggregate is total by version. The serialized form is part of
/// the external wire contract:
/// `{"aggregateId", "version", "requestId", "type", "payload"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<P> {
    pub aggregate_id: String,
    pub version: u64,
    pub request_id: String,
    #[serde(flatten)]
    pub payload: P,
}

impl<P: EventPayload> Event<P> {
    /// Wrap freshly decided payloads into envelopes, assigning contiguous
    /// versions starting right after `current_version`.
    pub fn envelope(
        aggregate_id: &str,
        current_version: u64,
        request_id: &str,
        payloads: Vec<P>,
    ) -> Vec<Event<P>> {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Event {
                aggregate_id: aggregate_id.to_string(),
                version: current_version + 1 + i as u64,
                request_id: request_id.to_string(),
                payload,
            })
            .collect()
    }
}
