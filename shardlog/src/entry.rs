//! Log entry types shared by the ingest and storage tiers.
//!
//! An [`IncomingEntry`] is what a producer sends. The ingest tier wraps it
//! into an [`EnrichedEntry`] exactly once, adding receipt metadata, and that
//! enriched form is what travels to storage and is persisted one JSON object
//! per line.
//!
//! # Wire Format
//!
//! ```text
//! {"timestamp":1700000000000,"service":"auth","level":"INFO","message":"login",
//!  "labels":{"env":"prod"},"received_at":1700000000123,
//!  "ingested_node_id":"id-string-1","client_ip":"203.0.113.5"}
//! ```
//!
//! `level` and `labels` are omitted when absent. Decoding is structural only:
//! missing fields fall back to their empty defaults.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A log entry as supplied by a producer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEntry {
    /// Producer-assigned timestamp in epoch milliseconds.
    #[serde(default)]
    pub timestamp: u64,
    /// Emitting service name; also the routing key.
    #[serde(default)]
    pub service: String,
    /// Optional severity level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Free-form message text.
    #[serde(default)]
    pub message: String,
    /// Optional key-value labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl IncomingEntry {
    /// Creates an entry with no level and no labels.
    pub fn new(timestamp: u64, service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            service: service.into(),
            level: None,
            message: message.into(),
            labels: None,
        }
    }

    /// Sets the severity level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Adds a label, creating the label map if needed.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// A log entry after server-side enrichment.
///
/// The producer fields are flattened into the same JSON object as the
/// receipt metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedEntry {
    /// The producer-supplied fields.
    #[serde(flatten)]
    pub entry: IncomingEntry,
    /// Server receipt time in epoch milliseconds.
    #[serde(default)]
    pub received_at: i64,
    /// Identity of the ingest node that accepted the entry.
    #[serde(default)]
    pub ingested_node_id: String,
    /// Producer address as seen by the ingest node, or `"unknown"`.
    #[serde(default)]
    pub client_ip: String,
}

impl EnrichedEntry {
    /// Wraps an incoming entry with receipt metadata.
    pub fn enrich(
        entry: IncomingEntry,
        received_at: i64,
        ingested_node_id: &str,
        client_ip: &str,
    ) -> Self {
        Self {
            entry,
            received_at,
            ingested_node_id: ingested_node_id.to_string(),
            client_ip: client_ip.to_string(),
        }
    }

    /// The routing key of this entry.
    pub fn service(&self) -> &str {
        &self.entry.service
    }

    /// The message text of this entry.
    pub fn message(&self) -> &str {
        &self.entry.message
    }
}

/// Current wall-clock time in epoch milliseconds.
#[allow(clippy::cast_possible_truncation)] // epoch millis fit in i64 for ~292M years
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enriched_entry_is_flat_json() {
        let entry = EnrichedEntry::enrich(
            IncomingEntry::new(1_700_000_000_000, "auth", "login ok")
                .with_level("INFO")
                .with_label("env", "prod"),
            1_700_000_000_123,
            "id-string-1",
            "203.0.113.5",
        );

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_000u64);
        assert_eq!(value["service"], "auth");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["message"], "login ok");
        assert_eq!(value["labels"]["env"], "prod");
        assert_eq!(value["received_at"], 1_700_000_000_123i64);
        assert_eq!(value["ingested_node_id"], "id-string-1");
        assert_eq!(value["client_ip"], "203.0.113.5");
        assert!(value.get("entry").is_none());
    }

    #[test]
    fn test_absent_optionals_are_omitted() {
        let entry = IncomingEntry::new(1, "svc", "msg");
        let text = serde_json::to_string(&entry).unwrap();

        assert!(!text.contains("level"));
        assert!(!text.contains("labels"));
    }

    #[test]
    fn test_decoding_is_lenient() {
        let entry: IncomingEntry = serde_json::from_str(r#"{"service":"billing"}"#).unwrap();

        assert_eq!(entry.service, "billing");
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.message, "");
        assert_eq!(entry.level, None);
        assert_eq!(entry.labels, None);
    }

    #[test]
    fn test_decode_enriched_from_stored_line() {
        let line = r#"{"timestamp":5,"service":"web","message":"hi","received_at":9,"ingested_node_id":"n1","client_ip":"10.0.0.1"}"#;
        let entry: EnrichedEntry = serde_json::from_str(line).unwrap();

        assert_eq!(entry.service(), "web");
        assert_eq!(entry.message(), "hi");
        assert_eq!(entry.entry.timestamp, 5);
        assert_eq!(entry.received_at, 9);
        assert_eq!(entry.ingested_node_id, "n1");
        assert_eq!(entry.client_ip, "10.0.0.1");
    }

    #[test]
    fn test_unix_millis_is_recent() {
        // 2023-11-14 in epoch millis
        assert!(unix_millis() > 1_700_000_000_000);
    }
}
