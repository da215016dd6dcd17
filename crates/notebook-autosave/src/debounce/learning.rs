//! Learned save timing: execution history, behavior classification and
//! per-pattern delay preferences.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{PREFERENCES_KEY, PreferenceStore};
use crate::tracker::TypingPattern;

/// Executions kept before the history is trimmed.
pub const MAX_EXECUTION_HISTORY: usize = 100;
/// Executions kept after trimming.
pub const TRIMMED_EXECUTION_HISTORY: usize = 50;

/// Delays kept per pattern before trimming.
pub const MAX_PATTERN_SAMPLES: usize = 20;
/// Delays kept per pattern after trimming.
pub const TRIMMED_PATTERN_SAMPLES: usize = 10;

/// Executions required before behavior is classified.
pub const MIN_EXECUTIONS_FOR_BEHAVIOR: usize = 10;

const BEHAVIOR_SAMPLE: usize = 20;
const CANCELLATION_WINDOW_MS: u64 = 5 * 60 * 1000;

/// One save that actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub timestamp: u64,
    /// Delay the save waited for; 0 for immediate saves.
    pub delay: u64,
}

/// How the user tends to work with saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserBehavior {
    /// Not enough executions yet.
    Learning,
    FastSaver,
    BatchSaver,
    InterruptionSensitive,
    ConsistentTypist,
    Standard,
}

impl UserBehavior {
    /// Multiplier applied to the recommended delay.
    #[must_use]
    pub const fn adjustment_factor(&self) -> f64 {
        match self {
            Self::FastSaver => 0.8,
            Self::BatchSaver => 1.3,
            Self::InterruptionSensitive => 1.5,
            Self::ConsistentTypist => 1.1,
            Self::Learning | Self::Standard => 1.0,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::FastSaver => "fast_saver",
            Self::BatchSaver => "batch_saver",
            Self::InterruptionSensitive => "interruption_sensitive",
            Self::ConsistentTypist => "consistent_typist",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for UserBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append an execution, trimming to the newest entries once over capacity.
pub(crate) fn push_execution(history: &mut Vec<ExecutionRecord>, record: ExecutionRecord) {
    history.push(record);
    if history.len() > MAX_EXECUTION_HISTORY {
        let excess = history.len() - TRIMMED_EXECUTION_HISTORY;
        history.drain(..excess);
    }
}

/// Rough share of scheduled saves that were superseded by further typing.
///
/// `1 - executions / (edits / 5)` over the last five minutes, floored at 0.
/// This is a ratio of activity levels, not a count of cancelled timers.
pub(crate) fn cancellation_rate(history: &[ExecutionRecord], recent_edits: usize, now: u64) -> f64 {
    if recent_edits == 0 {
        return 0.0;
    }
    let cutoff = now.saturating_sub(CANCELLATION_WINDOW_MS);
    let recent_executions = history.iter().filter(|e| e.timestamp >= cutoff).count();
    (1.0 - recent_executions as f64 / (recent_edits as f64 / 5.0)).max(0.0)
}

/// Classify save behavior from the execution history.
pub(crate) fn classify_behavior(
    history: &[ExecutionRecord],
    base_delay: u64,
    recent_edits: usize,
    now: u64,
) -> UserBehavior {
    if history.len() < MIN_EXECUTIONS_FOR_BEHAVIOR {
        return UserBehavior::Learning;
    }

    let sample = &history[history.len().saturating_sub(BEHAVIOR_SAMPLE)..];
    let avg_delay = sample.iter().map(|e| e.delay as f64).sum::<f64>() / sample.len() as f64;
    let avg_gap = match (sample.first(), sample.last()) {
        (Some(first), Some(last)) if sample.len() >= 2 => {
            last.timestamp.saturating_sub(first.timestamp) as f64 / (sample.len() - 1) as f64
        }
        _ => 0.0,
    };
    let cancellation = cancellation_rate(history, recent_edits, now);
    let base = base_delay as f64;

    if avg_delay < base * 0.8 && cancellation < 0.1 {
        UserBehavior::FastSaver
    } else if avg_delay > base * 1.3 && avg_gap > 10_000.0 {
        UserBehavior::BatchSaver
    } else if cancellation > 0.3 {
        UserBehavior::InterruptionSensitive
    } else if (avg_delay - base).abs() < base * 0.2 {
        UserBehavior::ConsistentTypist
    } else {
        UserBehavior::Standard
    }
}

/// Delays used per typing pattern, persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearnedPreferences {
    delays: BTreeMap<TypingPattern, Vec<u64>>,
}

impl LearnedPreferences {
    /// Append a delay for `pattern`, trimming old samples once over capacity.
    pub fn record(&mut self, pattern: TypingPattern, delay: u64) {
        let samples = self.delays.entry(pattern).or_default();
        samples.push(delay);
        if samples.len() > MAX_PATTERN_SAMPLES {
            let excess = samples.len() - TRIMMED_PATTERN_SAMPLES;
            samples.drain(..excess);
        }
    }

    pub fn samples(&self, pattern: TypingPattern) -> &[u64] {
        self.delays.get(&pattern).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mean learned delay for `pattern`, if any were recorded.
    pub fn average(&self, pattern: TypingPattern) -> Option<u64> {
        let samples = self.samples(pattern);
        if samples.is_empty() {
            return None;
        }
        Some((samples.iter().sum::<u64>() as f64 / samples.len() as f64).round() as u64)
    }

    /// Number of samples per pattern.
    pub fn counts(&self) -> BTreeMap<TypingPattern, usize> {
        self.delays
            .iter()
            .map(|(pattern, samples)| (*pattern, samples.len()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypingPattern, &[u64])> {
        self.delays
            .iter()
            .map(|(pattern, samples)| (*pattern, samples.as_slice()))
    }

    /// Read preferences from `store`. A missing key yields empty preferences.
    pub fn load(store: &dyn PreferenceStore) -> Result<Self, StoreError> {
        match store.load(PREFERENCES_KEY)? {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::Deserialization { source: e })
            }
            None => Ok(Self::default()),
        }
    }

    /// Write preferences to `store`.
    pub fn save(&self, store: &dyn PreferenceStore) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(self).map_err(|e| StoreError::Serialization { source: e })?;
        store.store(PREFERENCES_KEY, &json)
    }

    /// Load preferences, falling back to empty ones when the store fails.
    pub fn load_or_default(store: &dyn PreferenceStore) -> Self {
        Self::load(store).unwrap_or_else(|e| {
            tracing::warn!("Failed to load learned auto-save preferences: {}", e);
            Self::default()
        })
    }
}
