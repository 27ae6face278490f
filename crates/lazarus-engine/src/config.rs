//! Engine configuration.
//!
//! [`EngineConfig`] carries every tunable of the persistence engine. All
//! fields have defaults, so a config file only needs the values it changes:
//!
//! ```
//! use lazarus_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "save_key": "anvil", "reposition": { "ship": false } }"#).unwrap();
//! assert_eq!(config.save_key.as_deref(), Some("anvil"));
//! assert_eq!(config.save_debounce_secs, 5.0);
//! assert!(!config.reposition.ship);
//! assert!(config.reposition.ground);
//! ```

use std::path::Path;

use anyhow::Context;
use lazarus_world::identity::CompositeCategory;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RepositionCategories
// ---------------------------------------------------------------------------

/// Which composite categories are repositioned on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositionCategories {
    pub ground: bool,
    pub ship: bool,
    pub plane: bool,
    pub helicopter: bool,
}

impl Default for RepositionCategories {
    fn default() -> Self {
        Self {
            ground: true,
            ship: true,
            plane: true,
            helicopter: true,
        }
    }
}

impl RepositionCategories {
    /// `true` if composites of `category` may be respawned at saved
    /// positions.
    pub fn allows(&self, category: CompositeCategory) -> bool {
        match category {
            CompositeCategory::Ground => self.ground,
            CompositeCategory::Ship => self.ship,
            CompositeCategory::Plane => self.plane,
            CompositeCategory::Helicopter => self.helicopter,
        }
    }

    /// The enabled categories, in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = CompositeCategory> + '_ {
        CompositeCategory::ALL
            .into_iter()
            .filter(move |c| self.allows(*c))
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Tunables of a [`PersistenceEngine`](crate::engine::PersistenceEngine).
///
/// All durations are in seconds of virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Save slot. `None` uses the scenario title.
    pub save_key: Option<String>,
    /// Record losses of player-controlled units too.
    pub track_player_losses: bool,
    /// Quiet interval between a save request and the write.
    pub save_debounce_secs: f64,
    /// Interval of the periodic full save. `0` disables it.
    pub periodic_save_secs: f64,
    /// Number of removal passes after a load.
    pub removal_retries: u32,
    /// Interval between removal passes.
    pub removal_interval_secs: f64,
    /// Delay from load to respawn planning.
    pub respawn_delay_secs: f64,
    /// Interval between two composite respawns.
    pub respawn_throttle_secs: f64,
    /// Load anyway this long after construction if the host never announces
    /// the scenario start.
    pub bootstrap_fallback_secs: f64,
    /// Categories repositioned on load.
    pub reposition: RepositionCategories,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_key: None,
            track_player_losses: false,
            save_debounce_secs: 5.0,
            periodic_save_secs: 60.0,
            removal_retries: 30,
            removal_interval_secs: 5.0,
            respawn_delay_secs: 6.0,
            respawn_throttle_secs: 0.2,
            bootstrap_fallback_secs: 1.0,
            reposition: RepositionCategories::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or if [`validate`](Self::validate)
    /// rejects the result.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("parsing engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or
    /// [`from_json_str`](Self::from_json_str) fails.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Check every interval is usable by the scheduler.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInterval`] names the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("save_debounce_secs", self.save_debounce_secs),
            ("removal_interval_secs", self.removal_interval_secs),
            ("respawn_throttle_secs", self.respawn_throttle_secs),
        ];
        for (field, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidInterval { field, value });
            }
        }
        let non_negative = [
            ("periodic_save_secs", self.periodic_save_secs),
            ("respawn_delay_secs", self.respawn_delay_secs),
            ("bootstrap_fallback_secs", self.bootstrap_fallback_secs),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidInterval { field, value });
            }
        }
        Ok(())
    }
}

/// A config value the engine cannot run with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be a finite, usable interval, got {value}")]
    InvalidInterval { field: &'static str, value: f64 },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
