//! Scenario fingerprinting.
//!
//! A [`Fingerprint`] identifies "this particular scenario configuration". It
//! is derived only from static facts: theatre name, scenario title, and for
//! every faction (ascending id) the sorted list of its composite names. Two
//! scenarios sharing a save slot but differing in composite composition get
//! different fingerprints, so a snapshot of one is never applied to the
//! other.
//!
//! The hash is BLAKE3, which is platform independent, truncated to
//! [`FINGERPRINT_HEX_LEN`] lowercase hex digits (64 bits).
//!
//! ```
//! use lazarus_store::fingerprint::compute;
//! use lazarus_world::prelude::*;
//!
//! let desc = ScenarioDescription::new("Caucasus", "Op Anvil");
//! let a = compute(&desc);
//! assert_eq!(a, compute(&desc.clone()));
//! assert_eq!(a.as_str().len(), 16);
//! ```

use std::fmt;

use lazarus_world::scenario::ScenarioDescription;
use serde::{Deserialize, Serialize};

/// Hex digits kept from the BLAKE3 digest.
pub const FINGERPRINT_HEX_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Opaque scenario fingerprint (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed hex string, e.g. one read from a save file.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// compute
// ---------------------------------------------------------------------------

/// Fingerprint a scenario description.
///
/// Fields are NUL-terminated before hashing so that `("ab", "c")` and
/// `("a", "bc")` never collide by concatenation.
pub fn compute(description: &ScenarioDescription) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(description.theatre.as_bytes());
    hasher.update(&[0]);
    hasher.update(description.title.as_bytes());
    hasher.update(&[0]);

    for (faction, names) in description.composite_names_by_faction() {
        hasher.update(faction.0.to_string().as_bytes());
        hasher.update(&[0]);
        for name in names {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
    }

    let hex = hasher.finalize().to_hex();
    Fingerprint(hex.as_str()[..FINGERPRINT_HEX_LEN].to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
