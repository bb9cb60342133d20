//! Core record types for the a3s-activity log
//!
//! Field names serialize in snake_case; the same shape is used for the
//! JSON-lines file format, the read API, and CLI JSON output.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema tag written into every payload envelope
pub const PAYLOAD_SCHEMA: &str = "a3s.activity.data";

/// Current payload envelope version
pub const PAYLOAD_VERSION: u32 = 1;

/// Outcome classification of a logged action
///
/// Serialized as its numeric code (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Behaviour {
    Error = 0,
    #[default]
    Success = 1,
    Warning = 2,
}

impl Behaviour {
    /// Numeric code of this behaviour
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Map an integer code, falling back to `Success` for anything unknown
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Behaviour::Error,
            1 => Behaviour::Success,
            2 => Behaviour::Warning,
            _ => Behaviour::Success,
        }
    }

    /// Strict parse used by filters: codes, names, and boolean spellings
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "error" | "false" => Some(Behaviour::Error),
            "1" | "success" | "true" => Some(Behaviour::Success),
            "2" | "warning" => Some(Behaviour::Warning),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Behaviour::Error => "error",
            Behaviour::Success => "success",
            Behaviour::Warning => "warning",
        }
    }
}

impl Serialize for Behaviour {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Behaviour {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        match code {
            0 => Ok(Behaviour::Error),
            1 => Ok(Behaviour::Success),
            2 => Ok(Behaviour::Warning),
            other => Err(serde::de::Error::custom(format!(
                "unknown behaviour code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Loosely-typed behaviour accepted at the logging boundary
///
/// Booleans are a compatibility shim: `true` means success, `false` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviourInput {
    Flag(bool),
    Code(i64),
}

impl BehaviourInput {
    /// Normalize into one of the three canonical values
    pub fn normalize(self) -> Behaviour {
        match self {
            BehaviourInput::Flag(true) => Behaviour::Success,
            BehaviourInput::Flag(false) => Behaviour::Error,
            BehaviourInput::Code(code) => Behaviour::from_code(code),
        }
    }
}

impl From<bool> for BehaviourInput {
    fn from(flag: bool) -> Self {
        BehaviourInput::Flag(flag)
    }
}

impl From<i64> for BehaviourInput {
    fn from(code: i64) -> Self {
        BehaviourInput::Code(code)
    }
}

impl From<i32> for BehaviourInput {
    fn from(code: i32) -> Self {
        BehaviourInput::Code(code as i64)
    }
}

impl From<Behaviour> for BehaviourInput {
    fn from(b: Behaviour) -> Self {
        BehaviourInput::Code(b.code() as i64)
    }
}

/// Audience classification of a log entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Editor,
    Developer,
}

impl Level {
    /// Strict parse used by filters
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "editor" => Some(Level::Editor),
            "developer" => Some(Level::Developer),
            _ => None,
        }
    }

    /// Lenient parse used when logging; unknown values become `Editor`
    pub fn from_input(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Editor => "editor",
            Level::Developer => "developer",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Versioned envelope around the structured `data` of an entry
///
/// Serialized as `{"schema": "a3s.activity.data", "version": N, "payload": ...}`.
/// Any JSON value that is not an envelope decodes as a version-0 payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub struct Payload {
    /// Envelope version the payload was written with
    pub version: u32,

    /// Arbitrary structured data
    pub payload: serde_json::Value,
}

impl Payload {
    /// Wrap a value in an envelope of the current version
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            payload,
        }
    }

    /// Empty object payload
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Object(Default::default()))
    }

    /// Whether the payload carries no data
    pub fn is_empty(&self) -> bool {
        match &self.payload {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(ref map) = value {
            let tagged = map.get("schema").and_then(|s| s.as_str()) == Some(PAYLOAD_SCHEMA);
            if tagged && map.contains_key("payload") {
                let version = map
                    .get("version")
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(PAYLOAD_VERSION);
                let payload = map.get("payload").cloned().unwrap_or_default();
                return Self { version, payload };
            }
        }
        // Legacy: bare value without an envelope
        Self {
            version: 0,
            payload: value,
        }
    }
}

impl From<Payload> for serde_json::Value {
    fn from(p: Payload) -> Self {
        serde_json::json!({
            "schema": PAYLOAD_SCHEMA,
            "version": p.version,
            "payload": p.payload,
        })
    }
}

/// A single activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Backend-assigned identifier; absent until stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,

    /// Producer slug (plugin or subsystem)
    pub owner: String,

    /// Registered action key within the owner
    pub action_type: String,

    /// Free-form context tag (e.g. "post_type")
    #[serde(default)]
    pub object_type: String,

    pub behaviour: Behaviour,

    #[serde(default)]
    pub level: Level,

    /// 0 = no user
    #[serde(default)]
    pub user_id: u64,

    /// 0 = no object
    #[serde(default)]
    pub object_id: u64,

    pub message: String,

    #[serde(default)]
    pub data: Payload,

    /// Correlation id shared by all entries of one process; empty if uncorrelated
    #[serde(default)]
    pub request_id: String,

    /// Human-readable description of the triggering request or command
    #[serde(default)]
    pub request_context: String,

    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Copy of this entry without its backend id, for comparisons
    pub fn without_id(&self) -> LogEntry {
        LogEntry {
            log_id: None,
            ..self.clone()
        }
    }

    /// Whether two entries are equal in every field except `log_id`
    pub fn same_record(&self, other: &LogEntry) -> bool {
        self.without_id() == other.without_id()
    }
}

/// Builder for a log call, carrying everything `Logger::log_record` needs
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub owner: String,
    pub action_type: String,
    pub message: String,
    pub data: serde_json::Value,
    pub level: Level,
    pub object_type: String,
    pub behaviour: BehaviourInput,
    pub user_id: u64,
    pub object_id: u64,
}

impl LogRecord {
    pub fn new(
        owner: impl Into<String>,
        action_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            action_type: action_type.into(),
            message: message.into(),
            data: serde_json::Value::Object(Default::default()),
            level: Level::Editor,
            object_type: String::new(),
            behaviour: BehaviourInput::Flag(true),
            user_id: 0,
            object_id: 0,
        }
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn object_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = object_type.into();
        self
    }

    pub fn behaviour(mut self, behaviour: impl Into<BehaviourInput>) -> Self {
        self.behaviour = behaviour.into();
        self
    }

    pub fn user(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn object(mut self, object_id: u64) -> Self {
        self.object_id = object_id;
        self
    }
}

/// Current time, truncated to milliseconds so every backend round-trips it
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> LogEntry {
        LogEntry {
            log_id: None,
            owner: "plugin-a".to_string(),
            action_type: "save".to_string(),
            object_type: "post_type".to_string(),
            behaviour: Behaviour::Success,
            level: Level::Editor,
            user_id: 7,
            object_id: 42,
            message: "Item saved".to_string(),
            data: Payload::new(serde_json::json!({"title": "Hello"})),
            request_id: "0123456789abcdef".to_string(),
            request_context: "POST /items".to_string(),
            created_at: now(),
        }
    }

    #[test]
    fn test_behaviour_normalization() {
        assert_eq!(BehaviourInput::from(true).normalize(), Behaviour::Success);
        assert_eq!(BehaviourInput::from(false).normalize(), Behaviour::Error);
        assert_eq!(BehaviourInput::from(0).normalize(), Behaviour::Error);
        assert_eq!(BehaviourInput::from(1).normalize(), Behaviour::Success);
        assert_eq!(BehaviourInput::from(2).normalize(), Behaviour::Warning);
        assert_eq!(BehaviourInput::from(3).normalize(), Behaviour::Success);
        assert_eq!(BehaviourInput::from(-1).normalize(), Behaviour::Success);
        assert_eq!(BehaviourInput::from(i64::MAX).normalize(), Behaviour::Success);
    }

    #[test]
    fn test_behaviour_parse() {
        assert_eq!(Behaviour::parse("0"), Some(Behaviour::Error));
        assert_eq!(Behaviour::parse(" Warning "), Some(Behaviour::Warning));
        assert_eq!(Behaviour::parse("true"), Some(Behaviour::Success));
        assert_eq!(Behaviour::parse("7"), None);
        assert_eq!(Behaviour::parse(""), None);
    }

    #[test]
    fn test_behaviour_serializes_as_code() {
        let json = serde_json::to_string(&Behaviour::Warning).unwrap();
        assert_eq!(json, "2");
        let parsed: Behaviour = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Behaviour::Error);
        assert!(serde_json::from_str::<Behaviour>("5").is_err());
    }

    #[test]
    fn test_level_defaults_to_editor() {
        assert_eq!(Level::from_input("developer"), Level::Developer);
        assert_eq!(Level::from_input("DEVELOPER"), Level::Developer);
        assert_eq!(Level::from_input("admin"), Level::Editor);
        assert_eq!(Level::from_input(""), Level::Editor);
        assert_eq!(Level::default(), Level::Editor);
    }

    #[test]
    fn test_payload_envelope_shape() {
        let payload = Payload::new(serde_json::json!({"k": "v"}));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["schema"], PAYLOAD_SCHEMA);
        assert_eq!(value["version"], PAYLOAD_VERSION);
        assert_eq!(value["payload"]["k"], "v");
    }

    #[test]
    fn test_payload_legacy_value_is_version_zero() {
        let parsed: Payload = serde_json::from_str(r#"{"title": "old"}"#).unwrap();
        assert_eq!(parsed.version, 0);
        assert_eq!(parsed.payload["title"], "old");

        let scalar: Payload = serde_json::from_str("\"just a string\"").unwrap();
        assert_eq!(scalar.version, 0);
        assert_eq!(scalar.payload, "just a string");
    }

    #[test]
    fn test_payload_newer_version_preserved() {
        let json = r#"{"schema":"a3s.activity.data","version":9,"payload":[1,2]}"#;
        let parsed: Payload = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.version, 9);
        assert_eq!(parsed.payload, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_payload_out_of_range_version() {
        let json = r#"{"schema":"a3s.activity.data","version":4294967297,"payload":{}}"#;
        let parsed: Payload = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.version, PAYLOAD_VERSION);
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(Payload::empty().is_empty());
        assert!(Payload::new(serde_json::Value::Null).is_empty());
        assert!(!Payload::new(serde_json::json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = sample_entry();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"owner\":\"plugin-a\""));
        assert!(json.contains("\"behaviour\":1"));
        assert!(json.contains("\"level\":\"editor\""));
        assert!(!json.contains("log_id"));

        let parsed: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_same_record_ignores_id() {
        let entry = sample_entry();
        let mut stored = entry.clone();
        stored.log_id = Some("log-1".to_string());
        assert_ne!(entry, stored);
        assert!(entry.same_record(&stored));
    }

    #[test]
    fn test_now_is_millisecond_precision() {
        let ts = now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_log_record_builder() {
        let record = LogRecord::new("shop", "order.paid", "Order paid")
            .level(Level::Developer)
            .object_type("order")
            .behaviour(2)
            .user(3)
            .object(99);
        assert_eq!(record.level, Level::Developer);
        assert_eq!(record.behaviour.normalize(), Behaviour::Warning);
        assert_eq!(record.user_id, 3);
        assert_eq!(record.object_id, 99);
    }
}
