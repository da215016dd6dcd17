//! Introspection snapshot of a debounce instance.

use std::collections::BTreeMap;

use serde::Serialize;

use super::learning::UserBehavior;
use crate::tracker::TypingPattern;

/// Result of [`crate::AdaptiveDebounce::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebounceStatus {
    pub base_delay: u64,
    /// Last computed delay.
    pub current_delay: u64,
    /// Delay of the armed timer, if any.
    pub pending_delay: Option<u64>,
    /// Debounced saves currently running.
    pub in_flight: usize,
    /// Whether a save is waiting for the running one (single in-flight mode).
    pub queued: bool,
    pub execution_count: usize,
    pub last_execution: Option<u64>,
    pub pattern: TypingPattern,
    pub behavior: UserBehavior,
    /// Learned delay samples per pattern.
    pub learned: BTreeMap<TypingPattern, usize>,
    pub learning_enabled: bool,
    pub debug_mode: bool,
}

impl DebounceStatus {
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending_delay.is_some()
    }
}
