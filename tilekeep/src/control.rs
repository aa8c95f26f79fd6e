//! Application-to-layer control messages.
//!
//! The application posts JSON payloads; only objects whose `type` field names
//! a known command are acted upon. Everything else is ignored.

use serde_json::{json, Value};

/// Commands the interception layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Prune the tile partition down to the configured maximum.
    CleanMapCache,
}

impl ControlMessage {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ControlMessage::CleanMapCache => "CLEAN_MAP_CACHE",
        }
    }

    /// Recognize a posted payload. Unknown or malformed payloads yield `None`.
    pub fn parse(payload: &Value) -> Option<Self> {
        match payload.get("type").and_then(Value::as_str)? {
            "CLEAN_MAP_CACHE" => Some(ControlMessage::CleanMapCache),
            _ => None,
        }
    }

    /// Parse a raw JSON string; invalid JSON is treated as unrecognized.
    pub fn parse_str(raw: &str) -> Option<Self> {
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|value| Self::parse(&value))
    }

    /// The payload an application would post for this command.
    pub fn to_payload(&self) -> Value {
        json!({ "type": self.type_tag() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_map_cache() {
        let payload = json!({ "type": "CLEAN_MAP_CACHE" });
        assert_eq!(
            ControlMessage::parse(&payload),
            Some(ControlMessage::CleanMapCache)
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let payload = json!({ "type": "CLEAN_MAP_CACHE", "reason": "storage low" });
        assert_eq!(
            ControlMessage::parse(&payload),
            Some(ControlMessage::CleanMapCache)
        );
    }

    #[test]
    fn test_unrecognized_payloads() {
        for payload in [
            json!(null),
            json!("CLEAN_MAP_CACHE"),
            json!({}),
            json!({ "type": "clean_map_cache" }),
            json!({ "type": 7 }),
            json!({ "kind": "CLEAN_MAP_CACHE" }),
        ] {
            assert_eq!(ControlMessage::parse(&payload), None, "payload: {}", payload);
        }
    }

    #[test]
    fn test_parse_str() {
        assert_eq!(
            ControlMessage::parse_str(r#"{"type":"CLEAN_MAP_CACHE"}"#),
            Some(ControlMessage::CleanMapCache)
        );
        assert_eq!(ControlMessage::parse_str("{not json"), None);
    }

    #[test]
    fn test_payload_is_recognized() {
        let message = ControlMessage::CleanMapCache;
        assert_eq!(ControlMessage::parse(&message.to_payload()), Some(message));
    }
}
