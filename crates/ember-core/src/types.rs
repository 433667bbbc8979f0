//! Shared type definitions used across Ember crates.
//!
//! These mirror the two wire formats the external Firestorm tooling produces:
//! the run manifest (one JSON document listing agents) and the event log
//! (newline-delimited JSON, one event per line).

use serde::Deserialize;

/// Unique identifier for an agent within one run.
pub type AgentId = String;

/// One entry from the run manifest.
///
/// Immutable for the lifetime of a run; replaced wholesale when the next run
/// loads a new manifest. `persona` and `query_count` are informational and
/// tolerated when absent, `agent_id` is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentDescriptor {
    /// Identifier log events refer to
    pub agent_id: AgentId,

    /// Behavior label assigned by the generator
    #[serde(default)]
    pub persona: String,

    /// Number of queries the generator prepared for this agent
    #[serde(default)]
    pub query_count: u64,
}

/// The run manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunManifest {
    /// Ordered agent list; order fixes each agent's ring slot
    pub agents: Vec<AgentDescriptor>,
}

/// Recognized event kinds in the Firestorm event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An agent sent a query to the server
    QuerySent,
    /// The server answered an agent's query
    ResponseReceived,
}

impl EventKind {
    /// Parse a wire `event_type` value. Unrecognized kinds are `None`, which
    /// the router treats as "does not apply", never as an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query_sent" => Some(Self::QuerySent),
            "response_received" => Some(Self::ResponseReceived),
            _ => None,
        }
    }

    /// Wire spelling of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuerySent => "query_sent",
            Self::ResponseReceived => "response_received",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a structurally valid event-log line.
///
/// Both fields are optional on the wire: an object missing either is still a
/// valid event record with the field "unknown", not a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventRecord {
    /// Agent the event refers to
    pub agent_id: Option<AgentId>,

    /// Raw event kind string as written by the generator
    pub event_type: Option<String>,
}

impl EventRecord {
    /// The recognized kind of this event, if any.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.as_deref().and_then(EventKind::parse)
    }
}

/// One decoded unit of the event log.
///
/// Decoding is total: every line becomes exactly one record, either an
/// [`EventRecord`] or a raw line preserved verbatim. No line is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A line that parsed as a JSON object
    Event(EventRecord),
    /// A line that failed structured decoding, kept as-is
    Raw(String),
}

impl LogRecord {
    /// Decode one log line. Never fails; a line that is not a JSON object
    /// comes back as [`LogRecord::Raw`].
    pub fn decode(line: &str) -> Self {
        match serde_json::from_str::<EventRecord>(line) {
            Ok(event) => Self::Event(event),
            Err(_) => Self::Raw(line.to_string()),
        }
    }

    /// Returns true for records that failed structured decoding.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }

    /// Agent id, when present on a structured record.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Event(event) => event.agent_id.as_deref(),
            Self::Raw(_) => None,
        }
    }

    /// Recognized event kind, when present on a structured record.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Event(event) => event.kind(),
            Self::Raw(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_well_formed_line() {
        let record = LogRecord::decode(r#"{"agent_id":"agent_1","event_type":"query_sent"}"#);
        assert!(!record.is_raw());
        assert_eq!(record.agent_id(), Some("agent_1"));
        assert_eq!(record.kind(), Some(EventKind::QuerySent));
    }

    #[test]
    fn test_decode_missing_fields_is_not_an_error() {
        let record = LogRecord::decode(r#"{"event_type":"response_received"}"#);
        assert!(!record.is_raw());
        assert_eq!(record.agent_id(), None);
        assert_eq!(record.kind(), Some(EventKind::ResponseReceived));

        let record = LogRecord::decode(r#"{"agent_id":"agent_2"}"#);
        assert!(!record.is_raw());
        assert_eq!(record.agent_id(), Some("agent_2"));
        assert_eq!(record.kind(), None);
    }

    #[test]
    fn test_decode_unrecognized_kind_stays_structured() {
        let record = LogRecord::decode(r#"{"agent_id":"agent_3","event_type":"heartbeat"}"#);
        assert!(!record.is_raw());
        assert_eq!(record.kind(), None);
    }

    #[test]
    fn test_decode_extra_fields_are_ignored() {
        let record = LogRecord::decode(
            r#"{"agent_id":"agent_1","event_type":"query_sent","latency_ms":12,"query":"SELECT 1"}"#,
        );
        assert_eq!(record.kind(), Some(EventKind::QuerySent));
    }

    #[test]
    fn test_decode_is_total_on_garbage() {
        for line in [
            "not json at all",
            "{truncated",
            "42",
            r#""just a string""#,
            "[1, 2, 3]",
            "   ",
        ] {
            let record = LogRecord::decode(line);
            assert_eq!(record, LogRecord::Raw(line.to_string()));
        }
    }

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("query_sent"), Some(EventKind::QuerySent));
        assert_eq!(
            EventKind::parse("response_received"),
            Some(EventKind::ResponseReceived)
        );
        assert_eq!(EventKind::parse("QUERY_SENT"), None);
        assert_eq!(EventKind::parse(""), None);
    }

    #[test]
    fn test_manifest_deserializes() {
        let manifest: RunManifest = serde_json::from_str(
            r#"{"agents":[
                {"agent_id":"agent_1","persona":"analyst","query_count":20},
                {"agent_id":"agent_2"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(manifest.agents.len(), 2);
        assert_eq!(manifest.agents[0].persona, "analyst");
        assert_eq!(manifest.agents[1].persona, "");
        assert_eq!(manifest.agents[1].query_count, 0);
    }
}
