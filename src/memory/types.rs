//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (the three retention categories) and
//! [`MemoryPayload`] (the typed view over a stored point's payload). The
//! payload schema is open: unknown caller fields ride along in `extra` and
//! round-trip through the index unchanged.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Retention category of a memory. Drives the default expiry assigned at
/// store time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum MemoryType {
    /// Durable knowledge; never expires by default.
    #[serde(rename = "long-term")]
    LongTerm,
    /// Events and session context; expires after 90 days by default.
    #[serde(rename = "episodic")]
    Episodic,
    /// Scratch state; expires after 7 days by default.
    #[serde(rename = "short-term")]
    ShortTerm,
}

impl MemoryType {
    pub const ALL: [MemoryType; 3] = [Self::LongTerm, Self::Episodic, Self::ShortTerm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongTerm => "long-term",
            Self::Episodic => "episodic",
            Self::ShortTerm => "short-term",
        }
    }

    /// How long a memory of this type lives when the caller sets no expiry.
    pub fn default_ttl(&self) -> Option<Duration> {
        match self {
            Self::LongTerm => None,
            Self::Episodic => Some(Duration::days(90)),
            Self::ShortTerm => Some(Duration::days(7)),
        }
    }

    /// Default `expires_at` for a memory created at `now`.
    pub fn default_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.default_ttl().map(|ttl| now + ttl)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long-term" => Ok(Self::LongTerm),
            "episodic" => Ok(Self::Episodic),
            "short-term" => Ok(Self::ShortTerm),
            _ => Err(format!(
                "unknown memory type: {s} (expected long-term, episodic, or short-term)"
            )),
        }
    }
}

/// Typed view over a stored point's payload.
///
/// Every field the server itself reads or writes is typed; anything else a
/// caller attached is preserved verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_group_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MemoryPayload {
    /// Parse a raw payload map from the index.
    pub fn from_map(map: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }

    /// Whether this point is one chunk of a chunked document.
    pub fn is_chunk(&self) -> bool {
        self.chunk_index.is_some()
    }
}

/// Caller-supplied metadata accepted by the store and update tools.
///
/// Typed fields are validated; anything else is forwarded to the index
/// unchanged via `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StoreMetadata {
    /// Workspace slug (1-100 chars of letters, digits, '_', '-').
    #[schemars(description = "Workspace slug; auto-detected when omitted")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Memory type; defaults to `long-term`.
    #[schemars(description = "Memory type: 'long-term', 'episodic', or 'short-term'")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,

    /// Confidence score in `[0.0, 1.0]`; defaults to 0.7.
    #[schemars(description = "Confidence score 0.0-1.0. Defaults to 0.7.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Up to 20 tags of 1-50 characters each.
    #[schemars(description = "Up to 20 tags, 1-50 characters each")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Explicit expiry instant (RFC 3339). Derived from the memory type when
    /// omitted.
    #[schemars(description = "Expiry instant (RFC 3339); derived from memory_type when omitted")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,

    /// Any additional fields are stored verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoreMetadata {
    /// Validate the typed fields, returning the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!(
                    "confidence must be between 0.0 and 1.0, got {confidence}"
                ));
            }
        }
        if let Some(tags) = &self.tags {
            if tags.len() > 20 {
                return Err(format!("at most 20 tags allowed, got {}", tags.len()));
            }
            for tag in tags {
                let tag_chars = tag.chars().count();
                if tag_chars == 0 || tag_chars > 50 {
                    return Err(format!(
                        "tag '{tag}' must be 1-50 characters, got {tag_chars}"
                    ));
                }
            }
        }
        if let Some(expires_at) = &self.expires_at {
            if chrono::DateTime::parse_from_rfc3339(expires_at).is_err() {
                return Err(format!(
                    "expires_at must be an RFC 3339 instant, got '{expires_at}'"
                ));
            }
        }
        Ok(())
    }

    /// Flatten into a payload map, dropping unset fields.
    pub fn into_payload(self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips_strings() {
        for memory_type in MemoryType::ALL {
            let parsed: MemoryType = memory_type.as_str().parse().unwrap();
            assert_eq!(parsed, memory_type);
        }
        assert!("working".parse::<MemoryType>().is_err());
    }

    #[test]
    fn memory_type_serde_uses_hyphenated_names() {
        assert_eq!(
            serde_json::to_value(MemoryType::LongTerm).unwrap(),
            Value::String("long-term".into())
        );
        let parsed: MemoryType = serde_json::from_str(r#""short-term""#).unwrap();
        assert_eq!(parsed, MemoryType::ShortTerm);
    }

    #[test]
    fn default_expiry_per_type() {
        let now: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(MemoryType::LongTerm.default_expiry(now), None);
        assert_eq!(
            MemoryType::Episodic.default_expiry(now),
            Some("2026-04-01T00:00:00Z".parse().unwrap())
        );
        assert_eq!(
            MemoryType::ShortTerm.default_expiry(now),
            Some("2026-01-08T00:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn unknown_payload_fields_round_trip() {
        let raw = serde_json::json!({
            "content": "note",
            "memory_type": "episodic",
            "confidence": 0.9,
            "project_phase": "beta",
            "ticket": 1234
        });
        let payload = MemoryPayload::from_map(raw.as_object().unwrap().clone());
        assert_eq!(payload.content, "note");
        assert_eq!(payload.memory_type, Some(MemoryType::Episodic));
        assert_eq!(payload.extra["project_phase"], "beta");
        assert_eq!(payload.extra["ticket"], 1234);

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["project_phase"], "beta");
        assert_eq!(back["ticket"], 1234);
    }

    #[test]
    fn chunk_detection() {
        let mut payload = MemoryPayload::default();
        assert!(!payload.is_chunk());
        payload.chunk_index = Some(0);
        assert!(payload.is_chunk());
    }

    #[test]
    fn metadata_validation_bounds() {
        let mut metadata = StoreMetadata {
            confidence: Some(1.5),
            ..Default::default()
        };
        assert!(metadata.validate().is_err());
        metadata.confidence = Some(0.5);
        assert!(metadata.validate().is_ok());

        metadata.tags = Some(vec!["ok".into(), "".into()]);
        assert!(metadata.validate().is_err());
        metadata.tags = Some(vec!["x".repeat(51)]);
        assert!(metadata.validate().is_err());
        // Length bound is in characters, not bytes
        metadata.tags = Some(vec!["é".repeat(50)]);
        assert!(metadata.validate().is_ok());
        metadata.tags = Some(vec!["é".repeat(51)]);
        assert!(metadata.validate().is_err());
        metadata.tags = Some((0..21).map(|i| format!("t{i}")).collect());
        assert!(metadata.validate().is_err());
        metadata.tags = Some(vec!["rust".into(), "memory".into()]);
        assert!(metadata.validate().is_ok());

        metadata.expires_at = Some("not a date".into());
        assert!(metadata.validate().is_err());
        metadata.expires_at = Some("2026-03-01T00:00:00Z".into());
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn metadata_flattens_to_payload() {
        let mut extra = Map::new();
        extra.insert("source".into(), Value::String("chat".into()));
        let metadata = StoreMetadata {
            workspace: Some("acme".into()),
            memory_type: Some(MemoryType::ShortTerm),
            confidence: Some(0.8),
            tags: None,
            expires_at: None,
            extra,
        };
        let payload = metadata.into_payload();
        assert_eq!(payload["workspace"], "acme");
        assert_eq!(payload["memory_type"], "short-term");
        assert_eq!(payload["source"], "chat");
        assert!(payload.get("tags").is_none());
        assert!(payload.get("expires_at").is_none());
    }
}
