//! Save-delay recommendations derived from a typing pattern.

use serde::Serialize;

use super::pattern::TypingPattern;

/// Upper bound for any recommended delay.
pub const MAX_RECOMMENDED_DELAY_MS: u64 = 10_000;

/// Quiet period after which an idle document should be saved right away.
pub const SAVE_NOW_IDLE_MS: u64 = 2_000;

/// Content length above which saves are spaced out further.
pub const LARGE_CONTENT_CHARS: usize = 50_000;
pub const LARGE_CONTENT_FLOOR_MS: u64 = 4_000;

pub const VERY_LARGE_CONTENT_CHARS: usize = 100_000;
pub const VERY_LARGE_CONTENT_FLOOR_MS: u64 = 5_000;

/// Result of [`crate::EditHistoryTracker::auto_save_recommendations`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoSaveRecommendation {
    pub recommended_delay: u64,
    pub reason: String,
    pub should_save_now: bool,
    pub pattern: TypingPattern,
    pub confidence: f64,
}

/// Apply the per-pattern delay rule to `base_delay`.
pub(crate) fn pattern_delay(pattern: TypingPattern, base_delay: u64) -> (u64, &'static str) {
    let base = base_delay as f64;
    let scaled = |factor: f64| (base * factor).round() as u64;
    match pattern {
        TypingPattern::FastTyping => (
            scaled(2.0).max(4_000),
            "Fast typing detected, waiting longer to avoid interrupting",
        ),
        TypingPattern::SteadyTyping => (
            scaled(1.5).max(3_000),
            "Steady typing, moderate delay",
        ),
        TypingPattern::RapidChanges => (
            scaled(1.8).max(3_500),
            "Rapid changes, batching saves",
        ),
        TypingPattern::Editing => (
            scaled(1.2).max(2_500),
            "Editing existing text, slightly longer delay",
        ),
        TypingPattern::Pasting => (
            scaled(0.8).min(1_500),
            "Paste detected, saving soon",
        ),
        TypingPattern::Idle => (scaled(0.5).min(1_000), "User idle, saving quickly"),
        TypingPattern::Unknown => (base_delay, "Using default delay"),
    }
}

/// Raise `delay` for large documents, appending a note to `reason`.
pub(crate) fn apply_content_floor(delay: u64, content_length: usize, reason: &mut String) -> u64 {
    if content_length > VERY_LARGE_CONTENT_CHARS {
        reason.push_str(" (very large document)");
        delay.max(VERY_LARGE_CONTENT_FLOOR_MS)
    } else if content_length > LARGE_CONTENT_CHARS {
        reason.push_str(" (large document)");
        delay.max(LARGE_CONTENT_FLOOR_MS)
    } else {
        delay
    }
}
