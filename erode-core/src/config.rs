//! Configuration for the erode engine.
//!
//! Maps directly to `erode.toml`. Every field has a serde default, so an empty
//! file (or a missing section) yields the tuned defaults.

use serde::{Deserialize, Serialize};

/// Top-level erode configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErodeConfig {
    /// Per-character decay algorithm constants.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Word/vowel stability policy.
    #[serde(default)]
    pub stability: StabilityConfig,
    /// Ambient ticking and accelerate tuning.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Registry limits and event fan-out.
    #[serde(default)]
    pub store: StoreConfig,
    /// Durable key-value backend settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl ErodeConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ErodeError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ErodeError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Constants of the per-character decay pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Scale applied to the clamped intensity to get the per-pass hit chance.
    #[serde(default = "default_0_15")]
    pub chance_scale: f64,
    /// Upper bound of the "drop to space" mode band.
    #[serde(default = "default_0_30")]
    pub drop_threshold: f64,
    /// Upper bound of the "static glyph" mode band.
    #[serde(default = "default_0_50")]
    pub static_threshold: f64,
    /// Upper bound of the "echo previous character" mode band.
    #[serde(default = "default_0_70")]
    pub echo_threshold: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            chance_scale: 0.15,
            drop_threshold: 0.30,
            static_threshold: 0.50,
            echo_threshold: 0.70,
        }
    }
}

/// Per-character resistance policy used by ambient decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Stability of an ordinary interior character.
    #[serde(default = "default_0_50")]
    pub base: f64,
    /// Bonus for the first character of each word.
    #[serde(default = "default_0_30")]
    pub word_initial_bonus: f64,
    /// Penalty for vowels.
    #[serde(default = "default_0_20")]
    pub vowel_penalty: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            base: 0.5,
            word_initial_bonus: 0.3,
            vowel_penalty: 0.2,
        }
    }
}

/// Ambient tick and accelerate tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ambient intensity per second for a brand-new memory.
    #[serde(default = "default_ambient_rate")]
    pub ambient_rate_per_second: f64,
    /// How much each day of age multiplies the ambient rate.
    #[serde(default = "default_0_50")]
    pub age_acceleration_per_day: f64,
    /// Cap on the ambient intensity of a single tick.
    #[serde(default = "default_0_05")]
    pub max_ambient_intensity: f64,
    /// Decay passes run by an `accelerate(id, 1.0)` call.
    #[serde(default = "default_accelerate_passes")]
    pub accelerate_passes: u32,
    /// Interval of the background ambient driver, in seconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Seed for the scheduler RNG; `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ambient_rate_per_second: 0.000_5,
            age_acceleration_per_day: 0.5,
            max_ambient_intensity: 0.05,
            accelerate_passes: 20,
            tick_interval_seconds: 5,
            seed: None,
        }
    }
}

/// Registry limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Submissions longer than this (in chars, after normalization) are cut.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Buffer size of the change-notification channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 2_000,
            event_capacity: 256,
        }
    }
}

/// Durable backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// The single key the whole registry is written under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Use WAL mode for the SQLite backend.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Store and verify a CRC-32 of each payload.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: "erode.memories".to_string(),
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_storage_key() -> String { "erode.memories".to_string() }
fn default_0_05() -> f64 { 0.05 }
fn default_0_15() -> f64 { 0.15 }
fn default_0_20() -> f64 { 0.20 }
fn default_0_30() -> f64 { 0.30 }
fn default_0_50() -> f64 { 0.50 }
fn default_0_70() -> f64 { 0.70 }
fn default_ambient_rate() -> f64 { 0.000_5 }
fn default_accelerate_passes() -> u32 { 20 }
fn default_tick_interval() -> u64 { 5 }
fn default_max_text_chars() -> usize { 2_000 }
fn default_event_capacity() -> usize { 256 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = ErodeConfig::from_toml("").expect("empty config parses");
        assert!((config.decay.chance_scale - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.scheduler.accelerate_passes, 20);
        assert_eq!(config.persistence.storage_key, "erode.memories");
        assert!(config.scheduler.seed.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ErodeConfig::from_toml(
            r#"
            [scheduler]
            seed = 42
            accelerate_passes = 5

            [persistence]
            storage_key = "gallery"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.scheduler.seed, Some(42));
        assert_eq!(config.scheduler.accelerate_passes, 5);
        assert_eq!(config.scheduler.tick_interval_seconds, 5);
        assert_eq!(config.persistence.storage_key, "gallery");
        assert!(config.persistence.checksum_enabled);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = ErodeConfig::from_toml("[scheduler\nseed = ").expect_err("should fail");
        assert!(matches!(err, crate::ErodeError::Config(_)));
    }
}
