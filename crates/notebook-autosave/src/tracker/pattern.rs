//! Typing pattern classification.
//!
//! Patterns are decided by an ordered rule table: the first rule whose
//! predicate matches wins, otherwise the pattern is [`TypingPattern::Unknown`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named classification of recent editing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingPattern {
    Idle,
    Pasting,
    FastTyping,
    SteadyTyping,
    Editing,
    RapidChanges,
    Unknown,
}

impl TypingPattern {
    /// Get the snake_case name used as the preference key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pasting => "pasting",
            Self::FastTyping => "fast_typing",
            Self::SteadyTyping => "steady_typing",
            Self::Editing => "editing",
            Self::RapidChanges => "rapid_changes",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TypingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements the classification rules look at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatternSignals {
    /// Characters per minute.
    pub typing_speed: u64,
    /// Edits per minute.
    pub edit_frequency: f64,
    pub is_actively_typing: bool,
    pub insert_ratio: f64,
    pub delete_ratio: f64,
    pub paste_ratio: f64,
    /// Mean gap between edits in the gap window, `None` with fewer than two edits.
    pub avg_gap: Option<f64>,
}

impl PatternSignals {
    fn gap_below(&self, limit_ms: f64) -> bool {
        self.avg_gap.is_some_and(|gap| gap < limit_ms)
    }
}

/// One entry of the classification table.
#[derive(Debug, Clone, Copy)]
pub struct PatternRule {
    pub pattern: TypingPattern,
    pub confidence: f64,
    pub matches: fn(&PatternSignals) -> bool,
}

/// Confidence reported when no rule matches.
pub const UNKNOWN_CONFIDENCE: f64 = 0.5;

/// Classification rules in precedence order.
pub const CLASSIFICATION_RULES: &[PatternRule] = &[
    PatternRule {
        pattern: TypingPattern::Idle,
        confidence: 0.9,
        matches: |s| !s.is_actively_typing && s.edit_frequency < 5.0,
    },
    PatternRule {
        pattern: TypingPattern::Pasting,
        confidence: 0.8,
        matches: |s| s.paste_ratio > 0.5,
    },
    PatternRule {
        pattern: TypingPattern::FastTyping,
        confidence: 0.9,
        matches: |s| s.insert_ratio > 0.8 && s.gap_below(300.0) && s.typing_speed > 100,
    },
    PatternRule {
        pattern: TypingPattern::SteadyTyping,
        confidence: 0.8,
        matches: |s| s.insert_ratio > 0.7 && s.gap_below(800.0),
    },
    PatternRule {
        pattern: TypingPattern::Editing,
        confidence: 0.7,
        matches: |s| s.delete_ratio > 0.4,
    },
    PatternRule {
        pattern: TypingPattern::RapidChanges,
        confidence: 0.8,
        matches: |s| s.edit_frequency > 20.0,
    },
];

/// Classify signals with [`CLASSIFICATION_RULES`].
#[must_use]
pub fn classify(signals: &PatternSignals) -> (TypingPattern, f64) {
    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(signals))
        .map_or((TypingPattern::Unknown, UNKNOWN_CONFIDENCE), |rule| {
            (rule.pattern, rule.confidence)
        })
}

/// Session-level counters reported alongside a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionMetrics {
    pub recent_edits: usize,
    pub content_length: usize,
    pub session_duration_ms: u64,
}

/// Result of [`crate::EditHistoryTracker::analyze_typing_patterns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAnalysis {
    pub pattern: TypingPattern,
    pub confidence: f64,
    pub typing_speed: u64,
    pub edit_frequency: f64,
    pub is_actively_typing: bool,
    /// Mean gap in milliseconds, 0 when fewer than two edits were measured.
    pub avg_gap: f64,
    pub metrics: SessionMetrics,
}
