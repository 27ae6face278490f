//! Text codec for persisted snapshots.
//!
//! Snapshots are stored as pretty-printed JSON. [`encode`] and [`decode`] are
//! generic over serde types but the persisted root must always be a JSON
//! object: a file whose root is an array, string or number is rejected as a
//! [`StoreError::Parse`] before any typed decoding happens.
//!
//! ```
//! use lazarus_store::codec::{decode, encode};
//! use lazarus_store::snapshot::Snapshot;
//!
//! let mut snap = Snapshot::default();
//! snap.dead_units.insert("Tank-1".to_owned());
//!
//! let text = encode(&snap).unwrap();
//! let back: Snapshot = decode(&text).unwrap();
//! assert_eq!(back, snap);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::StoreError;

/// Serialize `value` to its durable text form.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] if the value does not serialize to a JSON
/// object (e.g. a bare sequence, or a map with non-string keys).
pub fn encode<T: Serialize>(value: &T) -> Result<String, StoreError> {
    let tree = serde_json::to_value(value).map_err(|e| StoreError::Parse {
        reason: format!("value is not serializable: {e}"),
    })?;
    if !tree.is_object() {
        return Err(StoreError::Parse {
            reason: "encoded root is not a mapping".to_owned(),
        });
    }
    serde_json::to_string_pretty(&tree).map_err(|e| StoreError::Parse {
        reason: e.to_string(),
    })
}

/// Parse durable text back into a typed value.
///
/// # Errors
///
/// Returns [`StoreError::Parse`] on malformed text, a non-mapping root, or a
/// structure that does not match `T` (including unknown top-level fields
/// when `T` denies them).
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    let tree: serde_json::Value = serde_json::from_str(text).map_err(|e| StoreError::Parse {
        reason: format!("line {} column {}: {e}", e.line(), e.column()),
    })?;
    if !tree.is_object() {
        return Err(StoreError::Parse {
            reason: "decoded root is not a mapping".to_owned(),
        });
    }
    serde_json::from_value(tree).map_err(|e| StoreError::Parse {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
