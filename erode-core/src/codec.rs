//! Durable payload format for the memory registry.
//!
//! The whole registry is written as one JSON document under a single key:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "memories": [
//!     { "id": "…", "original_text": "…", "current_text": "…",
//!       "degradation": 0.12, "created_at": "2026-01-01T00:00:00Z" }
//!   ]
//! }
//! ```
//!
//! Decoding also accepts the unversioned legacy layout: a bare array of
//! `{ id, originalText, currentText, degradation, createdAt }` records where
//! `id` is any string and `createdAt` is either epoch milliseconds or an
//! RFC 3339 string. Legacy ids that are not UUIDs are mapped to a stable v5
//! UUID so they keep their identity across reloads.
//!
//! Individual records that fail to decode or break an entity invariant are
//! dropped with a warning; the rest of the payload still loads.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::entity::MemoryEntity;
use crate::error::{ErodeError, Result};
use crate::types::MemoryId;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct RegistryOut<'a> {
    schema_version: u32,
    memories: &'a [MemoryEntity],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryIn {
    Versioned {
        schema_version: u32,
        memories: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    id: LegacyId,
    original_text: String,
    current_text: String,
    #[serde(default)]
    degradation: f64,
    created_at: LegacyTimestamp,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(u64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

/// Serialize `memories` (in registry order) into the current payload format.
///
/// # Errors
/// Returns [`ErodeError::Serialization`] if JSON encoding fails.
pub fn encode(memories: &[MemoryEntity]) -> Result<Vec<u8>> {
    serde_json::to_vec(&RegistryOut {
        schema_version: SCHEMA_VERSION,
        memories,
    })
    .map_err(|e| ErodeError::Serialization(e.to_string()))
}

/// Decode a payload produced by [`encode`] or the legacy array layout.
///
/// # Errors
/// Returns [`ErodeError::Serialization`] if the payload is not a registry at
/// all, or [`ErodeError::UnsupportedSchema`] if it was written by a newer
/// schema.
pub fn decode(bytes: &[u8]) -> Result<Vec<MemoryEntity>> {
    let registry: RegistryIn =
        serde_json::from_slice(bytes).map_err(|e| ErodeError::Serialization(e.to_string()))?;

    let (version, records) = match registry {
        RegistryIn::Versioned {
            schema_version,
            memories,
        } => (schema_version, memories),
        RegistryIn::Legacy(records) => (0, records),
    };

    if version > SCHEMA_VERSION {
        return Err(ErodeError::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    let mut seen = HashSet::new();
    let mut memories = Vec::with_capacity(records.len());
    for (position, record) in records.into_iter().enumerate() {
        let decoded = if version == 0 {
            decode_legacy(record)
        } else {
            serde_json::from_value::<MemoryEntity>(record)
                .map_err(|e| ErodeError::Serialization(e.to_string()))
        };

        let entity = match decoded.and_then(|e| e.validate().map(|()| e)) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(position, error = %e, "Dropping undecodable memory record");
                continue;
            }
        };

        if !seen.insert(entity.id) {
            warn!(id = %entity.id, "Dropping duplicate memory record");
            continue;
        }
        memories.push(entity);
    }

    Ok(memories)
}

fn decode_legacy(record: serde_json::Value) -> Result<MemoryEntity> {
    let legacy: LegacyRecord =
        serde_json::from_value(record).map_err(|e| ErodeError::Serialization(e.to_string()))?;

    let id = match legacy.id {
        LegacyId::Text(s) => Uuid::parse_str(&s)
            .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, s.as_bytes())),
        LegacyId::Number(n) => Uuid::new_v5(&Uuid::NAMESPACE_OID, n.to_string().as_bytes()),
    };

    let created_at = match legacy.created_at {
        LegacyTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms).ok_or_else(|| {
            ErodeError::Serialization(format!("createdAt out of range: {ms}"))
        })?,
        LegacyTimestamp::Text(ts) => ts,
    };

    Ok(MemoryEntity {
        id: MemoryId(id),
        original_text: legacy.original_text,
        current_text: legacy.current_text,
        degradation: legacy.degradation,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(text: &str, degradation: f64) -> MemoryEntity {
        let mut e = MemoryEntity::new(MemoryId::new(), text.to_string(), Utc::now());
        e.degradation = degradation;
        e
    }

    #[test]
    fn payload_carries_schema_version() {
        let bytes = encode(&[sample("kite string", 0.0)]).expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["memories"][0]["original_text"], "kite string");
    }

    #[test]
    fn decode_preserves_order_and_fields() {
        let mut first = sample("the orchard", 0.25);
        first.current_text = "the o chard".to_string();
        let second = sample("grandmother's hands", 0.0);

        let bytes = encode(&[first.clone(), second.clone()]).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(matches!(
            decode(b"{not json"),
            Err(ErodeError::Serialization(_))
        ));
        assert!(decode(br#"{"something": "else"}"#).is_err());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let err = decode(br#"{"schema_version": 99, "memories": []}"#).expect_err("newer schema");
        assert!(matches!(
            err,
            ErodeError::UnsupportedSchema { found: 99, .. }
        ));
    }

    #[test]
    fn legacy_array_layout_is_accepted() {
        let payload = br#"[
            {"id": "m-1", "originalText": "blue door", "currentText": "bl e door",
             "degradation": 0.1, "createdAt": 1700000000000},
            {"id": 2, "originalText": "rain", "currentText": "rain",
             "degradation": 0, "createdAt": "2024-05-01T12:00:00Z"}
        ]"#;
        let decoded = decode(payload).expect("legacy decode");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].current_text, "bl e door");
        assert_eq!(decoded[0].created_at.timestamp_millis(), 1_700_000_000_000);

        // Legacy ids map to the same UUID on every load.
        let again = decode(payload).expect("legacy decode");
        assert_eq!(decoded[0].id, again[0].id);
    }

    #[test]
    fn invalid_records_are_dropped_individually() {
        let good = sample("steady", 0.0);
        let mut stretched = sample("short", 0.0);
        stretched.current_text = "much longer".to_string();

        let bytes = encode(&[stretched, good.clone()]).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded, vec![good]);
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let first = sample("once", 0.0);
        let mut dup = first.clone();
        dup.degradation = 0.5;

        let bytes = encode(&[first.clone(), dup]).expect("encode");
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded, vec![first]);
    }
}
