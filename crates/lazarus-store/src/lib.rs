//! Lazarus Store -- snapshot schema, codec, fingerprinting and durable
//! storage.
//!
//! # Modules
//!
//! - [`codec`]: JSON text codec restricted to mapping roots.
//! - [`snapshot`]: the persisted [`Snapshot`](snapshot::Snapshot) schema and
//!   the in-memory [`SnapshotStore`](snapshot::SnapshotStore).
//! - [`fingerprint`]: stable scenario fingerprints used to validate loads.
//! - [`gateway`]: save-slot path resolution and atomic snapshot I/O, guarded
//!   by host availability.

#![deny(unsafe_code)]

pub mod codec;
pub mod fingerprint;
pub mod gateway;
pub mod snapshot;

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while persisting or loading snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The host denies durable I/O for this session.
    #[error("durable storage is unavailable on this host")]
    IoUnavailable,

    /// No snapshot has been written for this save slot yet.
    #[error("no snapshot at {}", path.display())]
    NotFound { path: PathBuf },

    /// The snapshot text is malformed or does not match the schema.
    #[error("malformed snapshot: {reason}")]
    Parse { reason: String },

    /// A loaded snapshot belongs to a different save slot or scenario.
    #[error("snapshot {field} mismatch: expected '{expected}', found '{found}'")]
    ValidationMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::fingerprint::{compute as compute_fingerprint, Fingerprint};
    pub use crate::gateway::StorageGateway;
    pub use crate::snapshot::{Snapshot, SnapshotMeta, SnapshotStore};
    pub use crate::StoreError;
}
