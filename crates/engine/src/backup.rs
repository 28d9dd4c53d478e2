//! Whole-store backup and restore
//!
//! ## Format
//!
//! ```json
//! {
//!   "formatId": "planstore.plans",
//!   "version": 1,
//!   "exportedAt": "2024-01-05T10:00:00.000Z",
//!   "recordCount": 2,
//!   "data": { "nextId": 3, "records": [ ... ] }
//! }
//! ```
//!
//! `formatId` and `version` are exact-match discriminators: anything else
//! is rejected before the payload is even decoded. Import validates the
//! whole payload (field normalizers, id uniqueness, `nextId`, unique keys)
//! before the store is touched.

use planstore_core::{
    now, Envelope, RecordId, StoreError, StoreResult, Timestamp, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::Entity;

/// Self-contained snapshot of a whole store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope<F> {
    /// Entity format discriminator
    pub format_id: String,
    /// Format version discriminator
    pub version: u32,
    /// When the backup was taken
    pub exported_at: Timestamp,
    /// Number of records in `data`
    pub record_count: usize,
    /// The store envelope
    pub data: Envelope<F>,
}

impl<F> BackupEnvelope<F> {
    /// Wrap a deep copy of an envelope for entity `E`
    pub(crate) fn new<E: Entity<Fields = F>>(data: Envelope<F>) -> Self {
        BackupEnvelope {
            format_id: E::BACKUP_FORMAT_ID.to_string(),
            version: E::BACKUP_VERSION,
            exported_at: now(),
            record_count: data.records.len(),
            data,
        }
    }
}

/// Result of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Records now in the store
    pub record_count: usize,
    /// The store's id counter after import
    pub next_id: RecordId,
}

/// Decode and fully validate an import payload for entity `E`
pub(crate) fn prepare_import<E: Entity>(payload: Value) -> StoreResult<Envelope<E::Fields>> {
    let object = payload
        .as_object()
        .ok_or_else(|| StoreError::validation("backup", "must be a JSON object"))?;

    match object.get("formatId").and_then(Value::as_str) {
        Some(id) if id == E::BACKUP_FORMAT_ID => {}
        other => {
            return Err(StoreError::validation(
                "formatId",
                format!("expected '{}', got {}", E::BACKUP_FORMAT_ID, describe(other)),
            ))
        }
    }

    match object.get("version").and_then(Value::as_u64) {
        Some(v) if v == u64::from(E::BACKUP_VERSION) => {}
        _ => {
            return Err(StoreError::validation(
                "version",
                format!(
                    "expected {}, got {}",
                    E::BACKUP_VERSION,
                    object.get("version").unwrap_or(&Value::Null)
                ),
            ))
        }
    }

    let backup: BackupEnvelope<E::Fields> = serde_json::from_value(payload)
        .map_err(|e| StoreError::validation("data", e.to_string()))?;

    if backup.record_count != backup.data.records.len() {
        return Err(StoreError::validation(
            "recordCount",
            format!(
                "declares {} records but data holds {}",
                backup.record_count,
                backup.data.records.len()
            ),
        ));
    }

    let mut envelope = backup.data;
    for (i, record) in envelope.records.iter_mut().enumerate() {
        record.fields = E::renormalize(record.fields.clone()).map_err(|e| {
            ValidationError::new(format!("data.records[{}].{}", i, e.field), e.message)
        })?;
    }

    envelope
        .check_structure(|f| E::unique_key(f).map(|k| k.value))
        .map_err(|v| StoreError::validation("data", v.to_string()))?;

    Ok(envelope)
}

fn describe(value: Option<&str>) -> String {
    match value {
        Some(s) => format!("'{}'", s),
        None => "nothing".to_string(),
    }
}
