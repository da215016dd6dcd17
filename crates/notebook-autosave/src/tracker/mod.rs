//! Edit history tracking and typing pattern analysis.
//!
//! The tracker keeps a bounded log of edits for the open document and
//! derives statistics over sliding time windows:
//!
//! | Window | Used for |
//! |--------|----------|
//! | 30 s   | Whether there is any recent activity, edit-kind ratios |
//! | 10 s   | Typing speed, edit frequency, active-typing check |
//! | 5 s    | Mean gap between edits |
//!
//! Nothing here fails: lengths and offsets are unsigned and an empty history
//! simply yields zeroed statistics.

mod event;
mod pattern;
mod recommend;

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;

pub use event::{EditEvent, EditKind};
pub use pattern::{
    CLASSIFICATION_RULES, PatternAnalysis, PatternRule, PatternSignals, SessionMetrics,
    TypingPattern, UNKNOWN_CONFIDENCE, classify,
};
pub use recommend::{AutoSaveRecommendation, MAX_RECOMMENDED_DELAY_MS, SAVE_NOW_IDLE_MS};

/// Default number of edits kept in history.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Maximum quiet time for the user to still count as typing.
pub const ACTIVE_TYPING_GAP_MS: u64 = 1_500;

/// Baseline delay used by [`EditHistoryTracker::debug_info`].
pub const DEFAULT_BASE_DELAY_MS: u64 = 2_000;

const PATTERN_WINDOW_MS: u64 = 30_000;
const ACTIVITY_WINDOW_MS: u64 = 10_000;
const GAP_WINDOW_MS: u64 = 5_000;

/// Bounded log of edits for one editing session.
#[derive(Debug)]
pub struct EditHistoryTracker {
    history: VecDeque<EditEvent>,
    max_history: usize,
    session_start: u64,
    last_edit: Option<u64>,
    content_length: usize,
    clock: Arc<dyn Clock>,
}

impl EditHistoryTracker {
    /// Create a tracker keeping [`DEFAULT_MAX_HISTORY`] edits.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(clock, DEFAULT_MAX_HISTORY)
    }

    /// Create a tracker keeping at most `max_history` edits (minimum 1).
    pub fn with_capacity(clock: Arc<dyn Clock>, max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
            session_start: clock.now_ms(),
            last_edit: None,
            content_length: 0,
            clock,
        }
    }

    /// Record an edit together with a snapshot of the current content.
    ///
    /// Only the length of `content_sample` is kept.
    pub fn record_edit(&mut self, kind: EditKind, position: usize, length: usize, content_sample: &str) {
        self.record_edit_with_len(kind, position, length, content_sample.chars().count());
    }

    /// Record an edit when only the content length is known.
    pub fn record_edit_with_len(
        &mut self,
        kind: EditKind,
        position: usize,
        length: usize,
        content_length: usize,
    ) {
        let timestamp = self.clock.now_ms();
        self.history.push_back(EditEvent {
            kind,
            position,
            length,
            timestamp,
            sample_len: content_length,
        });
        self.last_edit = Some(timestamp);
        self.content_length = content_length;

        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// Edits with `timestamp >= now - window_ms`, oldest first.
    pub fn recent_activity(&self, window_ms: u64) -> impl Iterator<Item = &EditEvent> {
        let cutoff = self.clock.now_ms().saturating_sub(window_ms);
        self.history.iter().filter(move |event| event.timestamp >= cutoff)
    }

    /// Characters per minute added by inserts and pastes within the window.
    pub fn typing_speed(&self, window_ms: u64) -> u64 {
        let mut any = false;
        let mut chars = 0usize;
        for event in self.recent_activity(window_ms) {
            any = true;
            if event.kind.adds_text() {
                chars += event.length;
            }
        }
        if !any {
            return 0;
        }
        let span = window_ms.max(1_000) as f64;
        (chars as f64 * 60_000.0 / span).round() as u64
    }

    /// Whether the last edit was under `max_gap_ms` ago and at least two
    /// edits happened in the last ten seconds.
    pub fn is_actively_typing(&self, max_gap_ms: u64) -> bool {
        let now = self.clock.now_ms();
        let recent_edit = self
            .last_edit
            .is_some_and(|last| now.saturating_sub(last) < max_gap_ms);
        recent_edit && self.recent_activity(ACTIVITY_WINDOW_MS).nth(1).is_some()
    }

    /// Edits per minute within the window.
    pub fn edit_frequency(&self, window_ms: u64) -> f64 {
        let count = self.recent_activity(window_ms).count();
        count as f64 * 60_000.0 / window_ms.max(1) as f64
    }

    /// Classify the current editing behavior.
    pub fn analyze_typing_patterns(&self) -> PatternAnalysis {
        let now = self.clock.now_ms();
        let recent: Vec<&EditEvent> = self.recent_activity(PATTERN_WINDOW_MS).collect();
        let metrics = SessionMetrics {
            recent_edits: recent.len(),
            content_length: self.content_length,
            session_duration_ms: now.saturating_sub(self.session_start),
        };

        if recent.is_empty() {
            return PatternAnalysis {
                pattern: TypingPattern::Idle,
                confidence: 1.0,
                typing_speed: 0,
                edit_frequency: 0.0,
                is_actively_typing: false,
                avg_gap: 0.0,
                metrics,
            };
        }

        let signals = self.signals(&recent);
        let (pattern, confidence) = classify(&signals);
        PatternAnalysis {
            pattern,
            confidence,
            typing_speed: signals.typing_speed,
            edit_frequency: signals.edit_frequency,
            is_actively_typing: signals.is_actively_typing,
            avg_gap: signals.avg_gap.unwrap_or(0.0),
            metrics,
        }
    }

    fn signals(&self, recent: &[&EditEvent]) -> PatternSignals {
        let total = recent.len() as f64;
        let ratio = |kind: EditKind| {
            recent.iter().filter(|event| event.kind == kind).count() as f64 / total
        };

        let gap_window: Vec<u64> = self
            .recent_activity(GAP_WINDOW_MS)
            .map(|event| event.timestamp)
            .collect();
        let avg_gap = match (gap_window.first(), gap_window.last()) {
            (Some(first), Some(last)) if gap_window.len() >= 2 => {
                Some(last.saturating_sub(*first) as f64 / (gap_window.len() - 1) as f64)
            }
            _ => None,
        };

        PatternSignals {
            typing_speed: self.typing_speed(ACTIVITY_WINDOW_MS),
            edit_frequency: self.edit_frequency(ACTIVITY_WINDOW_MS),
            is_actively_typing: self.is_actively_typing(ACTIVE_TYPING_GAP_MS),
            insert_ratio: ratio(EditKind::Insert),
            delete_ratio: ratio(EditKind::Delete),
            paste_ratio: ratio(EditKind::Paste),
            avg_gap,
        }
    }

    /// Recommend a save delay for the current pattern and document size.
    pub fn auto_save_recommendations(&self, base_delay: u64) -> AutoSaveRecommendation {
        let analysis = self.analyze_typing_patterns();
        let (delay, reason) = recommend::pattern_delay(analysis.pattern, base_delay);
        let mut reason = reason.to_string();
        let delay = recommend::apply_content_floor(delay, self.content_length, &mut reason)
            .min(MAX_RECOMMENDED_DELAY_MS);

        let now = self.clock.now_ms();
        let should_save_now = analysis.pattern == TypingPattern::Idle
            && self
                .last_edit
                .is_some_and(|last| now.saturating_sub(last) > SAVE_NOW_IDLE_MS);

        AutoSaveRecommendation {
            recommended_delay: delay,
            reason,
            should_save_now,
            pattern: analysis.pattern,
            confidence: analysis.confidence,
        }
    }

    /// Forget all edits and start a new session.
    pub fn reset(&mut self) {
        self.history.clear();
        self.session_start = self.clock.now_ms();
        self.last_edit = None;
        self.content_length = 0;
    }

    /// Snapshot of analysis, recommendation and the last ten seconds of edits.
    pub fn debug_info(&self) -> TrackerDebugInfo {
        TrackerDebugInfo {
            analysis: self.analyze_typing_patterns(),
            recommendation: self.auto_save_recommendations(DEFAULT_BASE_DELAY_MS),
            recent_activity: self
                .recent_activity(ACTIVITY_WINDOW_MS)
                .map(|event| ActivitySample {
                    kind: event.kind,
                    timestamp: event.timestamp,
                    length: event.length,
                })
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    #[inline]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Recorded edits, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &EditEvent> {
        self.history.iter()
    }

    #[inline]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    #[inline]
    pub fn last_edit_time(&self) -> Option<u64> {
        self.last_edit
    }

    #[inline]
    pub fn session_start(&self) -> u64 {
        self.session_start
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Compact view of one edit for debug output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySample {
    pub kind: EditKind,
    pub timestamp: u64,
    pub length: usize,
}

/// Result of [`EditHistoryTracker::debug_info`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerDebugInfo {
    pub analysis: PatternAnalysis,
    pub recommendation: AutoSaveRecommendation,
    pub recent_activity: Vec<ActivitySample>,
}
