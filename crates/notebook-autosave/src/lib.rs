//! Adaptive auto-save for the notebook editor.
//!
//! Instead of saving on a fixed timer, the editor records every change and
//! lets the typing rhythm decide how long to wait: bursts of fast typing
//! push saves back, idle moments and pastes bring them forward.
//!
//! # Features
//!
//! - **Edit history tracking** with sliding-window typing statistics
//! - **Pattern classification** into idle, pasting, fast/steady typing, editing and rapid changes
//! - **Adaptive debounce** with a single armed timer per document
//! - **Learning** of the user's save behavior, persisted between sessions
//! - **Environment awareness** (connectivity, device class, business hours)
//!
//! # Example
//!
//! ```ignore
//! use notebook_autosave::{AdaptiveDebounce, EditKind};
//!
//! let debounce = AdaptiveDebounce::new(2000);
//!
//! // On every editor change
//! debounce.record_edit(EditKind::Insert, cursor, 1, &content);
//! debounce.execute(move || api.save_note(id, content));
//!
//! // On blur or navigation
//! debounce.execute_immediate(|| api.save_note(id, content)).await?;
//! ```
//!
//! # Architecture
//!
//! The crate is organized into:
//!
//! - `tracker/` - Edit history, pattern analysis and delay recommendations
//! - `debounce/` - Adaptive debounce, learning and settings
//! - `session.rs` - Per-document glue between editor and save collaborator
//! - `clock.rs`, `environment.rs`, `store.rs` - Injectable time, host and storage
//! - `error.rs` - Error types with user-friendly messages

mod clock;
mod debounce;
mod environment;
mod error;
mod session;
mod store;
mod tracker;

// Re-export main types
pub use clock::{Clock, ManualClock, RuntimeClock};
pub use debounce::{
    AdaptiveDebounce, AdaptiveDebounceBuilder, AutoSaveSettings, BusinessHours, DebounceOptions,
    DebounceStatus, ExecutionRecord, LearnedPreferences, MAX_EXECUTION_HISTORY,
    MAX_PATTERN_SAMPLES, MIN_EXECUTIONS_FOR_BEHAVIOR, UserBehavior, apply_contextual_modifiers,
};
pub use environment::{ConnectionQuality, Environment, StaticEnvironment, SystemEnvironment};
pub use error::{BoxError, ConfigError, Result, SaveError, StoreError};
pub use session::{
    DirtyTracker, DocumentSession, EditOutcome, SaveCollaborator, SaveRequest, TextDirection,
};
pub use store::{FileStore, MemoryStore, PREFERENCES_KEY, PreferenceStore, default_store_dir};
pub use tracker::{
    ACTIVE_TYPING_GAP_MS, ActivitySample, AutoSaveRecommendation, CLASSIFICATION_RULES,
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_HISTORY, EditEvent,
    EditHistoryTracker, EditKind, MAX_RECOMMENDED_DELAY_MS, PatternAnalysis, PatternRule,
    PatternSignals, SAVE_NOW_IDLE_MS, SessionMetrics, TrackerDebugInfo, TypingPattern,
    UNKNOWN_CONFIDENCE, classify,
};
