//! Replay of recorded edit scripts against the typing analysis.
//!
//! A script is a JSON array of edits with absolute timestamps:
//!
//! ```json
//! [
//!   { "at_ms": 0,   "kind": "insert", "position": 0, "length": 1, "content_length": 1 },
//!   { "at_ms": 140, "kind": "insert", "position": 1, "length": 1, "content_length": 2 }
//! ]
//! ```
//!
//! Time comes from a manual clock set to each event's `at_ms`, so a replay
//! is deterministic and runs instantly.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use notebook_autosave::{
    AutoSaveSettings, EditHistoryTracker, EditKind, ManualClock, StaticEnvironment, TypingPattern,
    apply_contextual_modifiers,
};

/// One edit in a replay script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptEvent {
    pub at_ms: u64,
    pub kind: EditKind,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub content_length: usize,
}

/// Analysis after one replayed edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayStep {
    pub at_ms: u64,
    pub kind: EditKind,
    pub pattern: TypingPattern,
    pub confidence: f64,
    pub typing_speed: u64,
    pub edit_frequency: f64,
    pub recommended_delay: u64,
    /// Delay after environment modifiers and clamping.
    pub scheduled_delay: u64,
    pub should_save_now: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub base_delay: u64,
    pub steps: Vec<ReplayStep>,
}

impl ReplayReport {
    pub fn final_step(&self) -> Option<&ReplayStep> {
        self.steps.last()
    }

    /// Number of steps per pattern, in pattern order.
    pub fn pattern_counts(&self) -> Vec<(TypingPattern, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for step in &self.steps {
            *counts.entry(step.pattern).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }
}

pub fn parse_script(json: &str) -> Result<Vec<ScriptEvent>> {
    let events: Vec<ScriptEvent> = serde_json::from_str(json).context("parse edit script")?;
    if let Some(pair) = events.windows(2).find(|pair| pair[1].at_ms < pair[0].at_ms) {
        bail!(
            "edit script goes back in time: {} ms follows {} ms",
            pair[1].at_ms,
            pair[0].at_ms
        );
    }
    Ok(events)
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptEvent>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read edit script {}", path.display()))?;
    parse_script(&json).with_context(|| format!("load edit script {}", path.display()))
}

/// Feed `events` through a fresh tracker and record the analysis after each.
///
/// The environment is neutral (online, unknown connection, no device
/// limits) and no learned behavior is applied.
pub fn replay(events: &[ScriptEvent], settings: &AutoSaveSettings) -> ReplayReport {
    let start = events.first().map_or(0, |event| event.at_ms);
    let clock = ManualClock::new(start);
    let mut tracker = EditHistoryTracker::new(Arc::new(clock.clone()));
    let environment = StaticEnvironment::default();
    let base_delay = settings.base_delay_ms;

    let steps = events
        .iter()
        .map(|event| {
            clock.set(event.at_ms);
            tracker.record_edit_with_len(
                event.kind,
                event.position,
                event.length,
                event.content_length,
            );

            let analysis = tracker.analyze_typing_patterns();
            let recommendation = tracker.auto_save_recommendations(base_delay);
            let scheduled = settings.debounce.clamp(apply_contextual_modifiers(
                recommendation.recommended_delay,
                &environment,
                &settings.debounce,
            ));
            tracing::debug!(
                at_ms = event.at_ms,
                pattern = %analysis.pattern,
                delay = scheduled,
                "Replayed edit"
            );

            ReplayStep {
                at_ms: event.at_ms,
                kind: event.kind,
                pattern: analysis.pattern,
                confidence: analysis.confidence,
                typing_speed: analysis.typing_speed,
                edit_frequency: analysis.edit_frequency,
                recommended_delay: recommendation.recommended_delay,
                scheduled_delay: scheduled,
                should_save_now: recommendation.should_save_now,
                reason: recommendation.reason,
            }
        })
        .collect();

    ReplayReport { base_delay, steps }
}
