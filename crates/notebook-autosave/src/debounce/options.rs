//! Auto-save configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hours during which saves are spaced slightly further apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub enabled: bool,
    /// First hour (inclusive, 0-23).
    pub start_hour: u32,
    /// Last hour (exclusive, 1-24).
    pub end_hour: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start_hour: 9,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    /// Whether the adjustment applies at `hour`.
    #[must_use]
    pub fn contains(&self, hour: u32) -> bool {
        self.enabled && hour >= self.start_hour && hour < self.end_hour
    }
}

/// Bounds and feature flags for the adaptive debounce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceOptions {
    /// Lower bound for any scheduled delay.
    pub min_delay_ms: u64,

    /// Upper bound for any scheduled delay.
    pub max_delay_ms: u64,

    /// Only gates learning; the adjustment factors are fixed.
    pub learning_rate: f64,

    /// Learn per-pattern delays and adjust from the user's save behavior.
    pub enable_learning: bool,

    /// Log every delay decision at info level.
    pub debug_mode: bool,

    /// Never run two debounced saves at once; a save arriving while one is
    /// running waits and is replaced by any newer one.
    pub single_in_flight: bool,

    pub business_hours: BusinessHours,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 10_000,
            learning_rate: 0.1,
            enable_learning: true,
            debug_mode: false,
            single_in_flight: false,
            business_hours: BusinessHours::default(),
        }
    }
}

impl DebounceOptions {
    /// Clamp a delay into `[min_delay_ms, max_delay_ms]`.
    #[must_use]
    pub fn clamp(&self, delay: u64) -> u64 {
        delay.max(self.min_delay_ms).min(self.max_delay_ms)
    }

    /// Check that the bounds are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "min_delay_ms ({}) is greater than max_delay_ms ({})",
                    self.min_delay_ms, self.max_delay_ms
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.learning_rate) {
            return Err(ConfigError::Invalid {
                reason: format!("learning_rate {} is outside 0.0..=1.0", self.learning_rate),
            });
        }
        let hours = &self.business_hours;
        if hours.start_hour > 23 || hours.end_hour > 24 || hours.start_hour >= hours.end_hour {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "business hours {}..{} are not a valid range",
                    hours.start_hour, hours.end_hour
                ),
            });
        }
        Ok(())
    }
}

/// User settings for auto-save, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    /// Whether auto-save is enabled.
    pub enabled: bool,

    /// Baseline delay the adaptive logic scales from.
    pub base_delay_ms: u64,

    /// Longest time edits may stay unsaved while the user keeps typing.
    ///
    /// Once exceeded, the document session saves immediately instead of
    /// pushing the timer back again.
    pub max_unsaved_ms: u64,

    pub debounce: DebounceOptions,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 2000,    // 2 seconds
            max_unsaved_ms: 30_000, // 30 seconds max
            debounce: DebounceOptions::default(),
        }
    }
}

impl AutoSaveSettings {
    /// Create a disabled auto-save config.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Whether edits should arm a save timer at all.
    #[must_use]
    pub fn should_schedule(&self) -> bool {
        self.enabled
    }

    /// Whether a save is overdue given the time since the first unsaved change.
    #[must_use]
    pub fn is_overdue(&self, since_first_unsaved_ms: u64) -> bool {
        self.enabled && since_first_unsaved_ms >= self.max_unsaved_ms
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "base_delay_ms must be greater than zero".to_string(),
            });
        }
        self.debounce.validate()
    }

    /// Load and validate settings from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            operation: "read",
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize { source: e })?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            operation: "write",
            path: path.to_path_buf(),
            source: e,
        })
    }
}
