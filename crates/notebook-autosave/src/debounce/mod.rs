//! Adaptive debounce for auto-save.
//!
//! On every edit the caller hands [`AdaptiveDebounce::execute`] a save
//! closure. The debounce cancels whatever timer is armed, computes a fresh
//! delay from the tracker's pattern analysis, the learned save behavior and
//! the host environment, and arms a single new timer.
//!
//! ```text
//!             execute()                 timer fires
//!   Idle ───────────────▶ Pending ───────────────────▶ Idle (save runs)
//!    ▲                     │  ▲  │
//!    │  cancel()/reset()   │  └──┘ execute(): cancel + rearm
//!    └─────────────────────┘
//!
//!   execute_immediate(): any state ──▶ Idle, save runs synchronously
//! ```
//!
//! At most one timer is armed per instance. A save that already started is
//! never cancelled; unless `single_in_flight` is set, a slow save may still
//! be running when the next one fires. With `single_in_flight`, the save
//! queued behind a running one is dropped by `cancel()`, `reset()` and
//! `execute_immediate()`.

mod learning;
mod options;
mod status;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::clock::{Clock, RuntimeClock};
use crate::environment::{ConnectionQuality, Environment, SystemEnvironment};
use crate::store::{MemoryStore, PreferenceStore};
use crate::tracker::{
    DEFAULT_MAX_HISTORY, EditHistoryTracker, EditKind, TrackerDebugInfo, TypingPattern,
};

pub use learning::{
    ExecutionRecord, LearnedPreferences, MAX_EXECUTION_HISTORY, MAX_PATTERN_SAMPLES,
    MIN_EXECUTIONS_FOR_BEHAVIOR, UserBehavior,
};
pub use options::{AutoSaveSettings, BusinessHours, DebounceOptions};
pub use status::DebounceStatus;

type SaveFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type SaveJob = Box<dyn FnOnce() -> SaveFuture + Send>;

const OFFLINE_FACTOR: f64 = 0.7;
const SLOW_CONNECTION_FACTOR: f64 = 1.2;
const LOW_PERFORMANCE_FACTOR: f64 = 1.3;
const BUSINESS_HOURS_FACTOR: f64 = 1.1;

/// Window used to count recent edits for behavior analysis.
const BEHAVIOR_EDIT_WINDOW_MS: u64 = 5 * 60 * 1000;

/// The armed timer.
struct PendingSave {
    generation: u64,
    delay: u64,
    handle: JoinHandle<()>,
}

struct DebounceState {
    tracker: EditHistoryTracker,
    base_delay: u64,
    options: DebounceOptions,
    current_delay: u64,
    pending: Option<PendingSave>,
    generation: u64,
    last_execution: Option<u64>,
    executions: Vec<ExecutionRecord>,
    preferences: LearnedPreferences,
    in_flight: usize,
    queued: Option<SaveJob>,
}

impl DebounceState {
    fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    fn calculate_adaptive_delay(&mut self, environment: &dyn Environment) -> u64 {
        let recommendation = self.tracker.auto_save_recommendations(self.base_delay);
        let mut delay = recommendation.recommended_delay;
        if self.options.enable_learning {
            delay = self.apply_learning_adjustments(delay);
        }
        delay = apply_contextual_modifiers(delay, environment, &self.options);
        let delay = self.options.clamp(delay);
        self.current_delay = delay;

        if self.options.debug_mode {
            tracing::info!(
                pattern = %recommendation.pattern,
                recommended = recommendation.recommended_delay,
                delay,
                "{}",
                recommendation.reason
            );
        } else {
            tracing::debug!(
                pattern = %recommendation.pattern,
                recommended = recommendation.recommended_delay,
                delay,
                "Computed auto-save delay"
            );
        }
        delay
    }

    fn apply_learning_adjustments(&self, delay: u64) -> u64 {
        let factor = self.analyze_user_behavior_pattern().adjustment_factor();
        (delay as f64 * factor).round() as u64
    }

    fn analyze_user_behavior_pattern(&self) -> UserBehavior {
        let recent_edits = self.tracker.recent_activity(BEHAVIOR_EDIT_WINDOW_MS).count();
        learning::classify_behavior(
            &self.executions,
            self.base_delay,
            recent_edits,
            self.tracker.now_ms(),
        )
    }

    /// Record an execution; returns whether learned preferences changed.
    fn record_execution(&mut self, timestamp: u64, delay: u64) -> bool {
        learning::push_execution(&mut self.executions, ExecutionRecord { timestamp, delay });
        self.last_execution = Some(timestamp);

        if !self.options.enable_learning {
            return false;
        }
        let pattern = self.tracker.analyze_typing_patterns().pattern;
        self.preferences.record(pattern, delay);
        true
    }

    fn drop_queued(&mut self) -> bool {
        let dropped = self.queued.take().is_some();
        if dropped {
            tracing::trace!("Dropped queued auto-save");
        }
        dropped
    }
}

/// Scale `delay` for network, device and time-of-day conditions.
pub fn apply_contextual_modifiers(
    delay: u64,
    environment: &dyn Environment,
    options: &DebounceOptions,
) -> u64 {
    let mut delay = delay as f64;

    if !environment.is_online() {
        delay *= OFFLINE_FACTOR;
    } else if environment.connection_quality() == ConnectionQuality::Slow {
        delay *= SLOW_CONNECTION_FACTOR;
    }

    if environment.is_low_performance() {
        delay *= LOW_PERFORMANCE_FACTOR;
    }

    if environment
        .current_hour()
        .is_some_and(|hour| options.business_hours.contains(hour))
    {
        delay *= BUSINESS_HOURS_FACTOR;
    }

    delay.round() as u64
}

struct Shared {
    state: Mutex<DebounceState>,
    store: Arc<dyn PreferenceStore>,
    environment: Arc<dyn Environment>,
    /// Held across snapshot and write so the store always ends up with the
    /// newest preferences.
    persist_lock: Mutex<()>,
}

impl Shared {
    fn persist(&self) {
        let _guard = self.persist_lock.lock();
        let preferences = self.state.lock().preferences.clone();
        if let Err(e) = preferences.save(self.store.as_ref()) {
            tracing::warn!("Failed to persist learned auto-save preferences: {}", e);
        }
    }

    /// Persist on the blocking pool so store I/O stays off the runtime.
    async fn persist_blocking(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || shared.persist()).await {
            tracing::warn!("Preference write task failed: {}", e);
        }
    }

    /// Timer callback: runs only if this timer is still the armed one.
    async fn fire(self: Arc<Self>, generation: u64, delay: u64, job: SaveJob) {
        let (learned, run_now) = {
            let mut state = self.state.lock();
            if state.pending.as_ref().map(|p| p.generation) != Some(generation) {
                return;
            }
            state.pending = None;

            let now = state.tracker.now_ms();
            let learned = state.record_execution(now, delay);

            let run_now = if state.options.single_in_flight && state.in_flight > 0 {
                if state.queued.replace(job).is_some() {
                    tracing::debug!("Replaced queued auto-save with a newer one");
                }
                None
            } else {
                state.in_flight += 1;
                Some(job)
            };
            (learned, run_now)
        };

        if learned {
            self.persist_blocking().await;
        }

        if let Some(job) = run_now {
            self.run_saves(job).await;
        }
    }

    /// Run `job`, then anything queued behind it, logging failures.
    async fn run_saves(&self, mut job: SaveJob) {
        loop {
            match tokio::spawn(job()).await {
                Ok(Ok(())) => tracing::debug!("Auto-save completed"),
                Ok(Err(e)) => tracing::error!("Auto-save failed: {}", e),
                Err(e) => tracing::error!("Auto-save task failed: {}", e),
            }

            let mut state = self.state.lock();
            match state.queued.take() {
                Some(next) => job = next,
                None => {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    return;
                }
            }
        }
    }
}

/// Debounced, self-tuning save scheduler for one open document.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct AdaptiveDebounce {
    shared: Arc<Shared>,
}

impl fmt::Debug for AdaptiveDebounce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveDebounce")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl AdaptiveDebounce {
    /// Create a debounce with default options, an in-memory preference
    /// store and the host environment.
    pub fn new(base_delay: u64) -> Self {
        Self::builder(base_delay).build()
    }

    pub fn builder(base_delay: u64) -> AdaptiveDebounceBuilder {
        AdaptiveDebounceBuilder::new(base_delay)
    }

    /// Builder preloaded from user settings.
    pub fn from_settings(settings: &AutoSaveSettings) -> AdaptiveDebounceBuilder {
        Self::builder(settings.base_delay_ms).options(settings.debounce.clone())
    }

    /// Record an edit on the owned tracker.
    pub fn record_edit(&self, kind: EditKind, position: usize, length: usize, content_sample: &str) {
        self.shared
            .state
            .lock()
            .tracker
            .record_edit(kind, position, length, content_sample);
    }

    /// Record an edit when only the content length is known.
    pub fn record_edit_with_len(
        &self,
        kind: EditKind,
        position: usize,
        length: usize,
        content_length: usize,
    ) {
        self.shared
            .state
            .lock()
            .tracker
            .record_edit_with_len(kind, position, length, content_length);
    }

    /// Schedule `save` after an adaptive delay, superseding any armed timer.
    ///
    /// The save runs on its own task. Errors and panics are logged and
    /// swallowed. Returns the scheduled delay in milliseconds.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn execute<F, Fut, E>(&self, save: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let job: SaveJob = Box::new(move || -> SaveFuture {
            Box::pin(async move { save().await.map_err(|e| e.to_string()) })
        });

        let mut state = self.shared.state.lock();
        if state.cancel_pending() {
            tracing::trace!("Superseded armed auto-save timer");
        }
        let delay = state.calculate_adaptive_delay(self.shared.environment.as_ref());

        state.generation += 1;
        let generation = state.generation;
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            shared.fire(generation, delay, job).await;
        });
        state.pending = Some(PendingSave {
            generation,
            delay,
            handle,
        });
        delay
    }

    /// Cancel any scheduled save and run `save` right now on the caller's stack.
    ///
    /// Whatever `save` returns is handed back untouched.
    pub fn execute_immediate<F, R>(&self, save: F) -> R
    where
        F: FnOnce() -> R,
    {
        let learned = {
            let mut state = self.shared.state.lock();
            state.cancel_pending();
            state.drop_queued();
            let now = state.tracker.now_ms();
            state.record_execution(now, 0)
        };
        if learned {
            self.shared.persist();
        }
        save()
    }

    /// Cancel the armed timer and any save queued behind a running one,
    /// without saving. Returns whether anything was scheduled.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock();
        let armed = state.cancel_pending();
        state.drop_queued() || armed
    }

    /// Cancel scheduled saves and start over for a different document.
    ///
    /// Learned preferences and execution history are kept.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.cancel_pending();
        state.drop_queued();
        state.tracker.reset();
        state.current_delay = state.base_delay;
    }

    /// Compute (and remember) the delay the next `execute` would use.
    pub fn calculate_adaptive_delay(&self) -> u64 {
        self.shared
            .state
            .lock()
            .calculate_adaptive_delay(self.shared.environment.as_ref())
    }

    /// Scale `delay` by the factor for the current save behavior.
    pub fn apply_learning_adjustments(&self, delay: u64) -> u64 {
        self.shared.state.lock().apply_learning_adjustments(delay)
    }

    /// Scale `delay` for the current environment.
    pub fn apply_contextual_modifiers(&self, delay: u64) -> u64 {
        let state = self.shared.state.lock();
        apply_contextual_modifiers(delay, self.shared.environment.as_ref(), &state.options)
    }

    pub fn analyze_user_behavior_pattern(&self) -> UserBehavior {
        self.shared.state.lock().analyze_user_behavior_pattern()
    }

    /// Record a save that ran at `timestamp` after waiting `delay`.
    pub fn record_execution(&self, timestamp: u64, delay: u64) {
        let learned = self
            .shared
            .state
            .lock()
            .record_execution(timestamp, delay);
        if learned {
            self.shared.persist();
        }
    }

    pub fn status(&self) -> DebounceStatus {
        let state = self.shared.state.lock();
        DebounceStatus {
            base_delay: state.base_delay,
            current_delay: state.current_delay,
            pending_delay: state.pending.as_ref().map(|p| p.delay),
            in_flight: state.in_flight,
            queued: state.queued.is_some(),
            execution_count: state.executions.len(),
            last_execution: state.last_execution,
            pattern: state.tracker.analyze_typing_patterns().pattern,
            behavior: state.analyze_user_behavior_pattern(),
            learned: state.preferences.counts(),
            learning_enabled: state.options.enable_learning,
            debug_mode: state.options.debug_mode,
        }
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.shared.state.lock().options.debug_mode = enabled;
        tracing::info!("Auto-save debug mode {}", if enabled { "on" } else { "off" });
    }

    /// Whether a timer is armed.
    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    pub fn current_pattern(&self) -> TypingPattern {
        self.shared.state.lock().tracker.analyze_typing_patterns().pattern
    }

    /// Tracker analysis, recommendation and recent activity.
    pub fn debug_info(&self) -> TrackerDebugInfo {
        self.shared.state.lock().tracker.debug_info()
    }

    pub fn preferences(&self) -> LearnedPreferences {
        self.shared.state.lock().preferences.clone()
    }

    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.shared.state.lock().executions.clone()
    }

    pub fn options(&self) -> DebounceOptions {
        self.shared.state.lock().options.clone()
    }

    /// Time on the debounce clock.
    pub fn now_ms(&self) -> u64 {
        self.shared.state.lock().tracker.now_ms()
    }
}

/// Builder for [`AdaptiveDebounce`].
pub struct AdaptiveDebounceBuilder {
    base_delay: u64,
    options: DebounceOptions,
    max_history: usize,
    store: Option<Arc<dyn PreferenceStore>>,
    environment: Option<Arc<dyn Environment>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AdaptiveDebounceBuilder {
    pub fn new(base_delay: u64) -> Self {
        Self {
            base_delay,
            options: DebounceOptions::default(),
            max_history: DEFAULT_MAX_HISTORY,
            store: None,
            environment: None,
            clock: None,
        }
    }

    #[must_use]
    pub fn options(mut self, options: DebounceOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of edits the tracker keeps.
    #[must_use]
    pub fn max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    #[must_use]
    pub fn store(mut self, store: impl PreferenceStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    #[must_use]
    pub fn shared_store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build the debounce, loading learned preferences from the store.
    pub fn build(self) -> AdaptiveDebounce {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn PreferenceStore>);
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(SystemEnvironment) as Arc<dyn Environment>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(RuntimeClock::new()) as Arc<dyn Clock>);

        let preferences = LearnedPreferences::load_or_default(store.as_ref());

        let state = DebounceState {
            tracker: EditHistoryTracker::with_capacity(clock, self.max_history),
            base_delay: self.base_delay,
            options: self.options,
            current_delay: self.base_delay,
            pending: None,
            generation: 0,
            last_execution: None,
            executions: Vec::new(),
            preferences,
            in_flight: 0,
            queued: None,
        };

        AdaptiveDebounce {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                store,
                environment,
                persist_lock: Mutex::new(()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::environment::StaticEnvironment;
    use crate::error::SaveError;
    use crate::store::{FileStore, PREFERENCES_KEY};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn debounce(options: DebounceOptions) -> AdaptiveDebounce {
        AdaptiveDebounce::builder(2_000)
            .options(options)
            .environment(StaticEnvironment::default())
            .build()
    }

    fn counting_save(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::future::Ready<Result<(), SaveError>> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_supersedes_pending_timer() {
        let debounce = debounce(DebounceOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            debounce.record_edit(EditKind::Insert, 0, 1, "a");
            debounce.execute(counting_save(&calls));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debounce.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!debounce.is_pending());
        assert_eq!(debounce.executions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_computed_delay() {
        let debounce = debounce(DebounceOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        // No edits: idle pattern, min(2000 * 0.5, 1000)
        let delay = debounce.execute(counting_save(&calls));
        assert_eq!(delay, 1_000);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            debounce.executions(),
            vec![ExecutionRecord {
                timestamp: 1_000,
                delay: 1_000
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_immediate_cancels_pending() {
        let debounce = debounce(DebounceOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        debounce.execute(counting_save(&calls));
        let result = debounce.execute_immediate(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            "saved"
        });
        assert_eq!(result, "saved");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(debounce.executions()[0].delay, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_reset() {
        let debounce = debounce(DebounceOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(!debounce.cancel());
        debounce.execute(counting_save(&calls));
        assert!(debounce.cancel());
        assert!(!debounce.is_pending());

        debounce.record_edit(EditKind::Insert, 0, 5, "hello");
        debounce.execute(counting_save(&calls));
        debounce.reset();
        assert!(!debounce.is_pending());
        assert!(debounce.debug_info().recent_activity.is_empty());
        assert_eq!(debounce.status().current_delay, 2_000);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_save_is_swallowed() {
        let debounce = debounce(DebounceOptions::default());
        debounce.execute(|| async { Err::<(), _>(SaveError::failed("note-1", "offline")) });

        tokio::time::sleep(Duration::from_secs(5)).await;
        let status = debounce.status();
        assert!(!status.has_pending());
        assert_eq!(status.in_flight, 0);
        assert_eq!(status.execution_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_save_is_contained() {
        let debounce = debounce(DebounceOptions::default());
        debounce.execute(|| async {
            if true {
                panic!("save blew up");
            }
            Ok::<(), SaveError>(())
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(debounce.status().in_flight, 0);

        let calls = Arc::new(AtomicUsize::new(0));
        debounce.execute(counting_save(&calls));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_in_flight_coalesces_queued_saves() {
        let debounce = debounce(DebounceOptions {
            single_in_flight: true,
            ..Default::default()
        });
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow_save = |name: &'static str| {
            let log = Arc::clone(&log);
            move || async move {
                log.lock().push(format!("start {name}"));
                tokio::time::sleep(Duration::from_secs(5)).await;
                log.lock().push(format!("end {name}"));
                Ok::<(), SaveError>(())
            }
        };

        // Fires at 1s and runs until 6s.
        debounce.execute(slow_save("a"));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        // Fires at 2.5s while "a" is running: queued.
        debounce.execute(slow_save("b"));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        // Fires at 3.6s and replaces "b" in the queue.
        debounce.execute(slow_save("c"));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(debounce.status().queued);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            *log.lock(),
            vec!["start a", "end a", "start c", "end c"]
        );
        let status = debounce.status();
        assert_eq!(status.in_flight, 0);
        assert!(!status.queued);
        assert_eq!(status.execution_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_reset_drop_queued_save() {
        let debounce = debounce(DebounceOptions {
            single_in_flight: true,
            ..Default::default()
        });
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow_save = |name: &'static str| {
            let log = Arc::clone(&log);
            move || async move {
                log.lock().push(format!("start {name}"));
                tokio::time::sleep(Duration::from_secs(5)).await;
                log.lock().push(format!("end {name}"));
                Ok::<(), SaveError>(())
            }
        };

        // "a" runs from 1s to 6s; "b" fires at 2.5s and waits in the queue.
        debounce.execute(slow_save("a"));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        debounce.execute(slow_save("b"));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(debounce.status().queued);

        assert!(debounce.cancel());
        assert!(!debounce.status().queued);
        assert!(!debounce.cancel());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(*log.lock(), vec!["start a", "end a"]);

        // Same again, but switching documents.
        debounce.execute(slow_save("c"));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        debounce.execute(slow_save("d"));
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(debounce.status().queued);

        debounce.reset();
        assert!(!debounce.status().queued);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            *log.lock(),
            vec!["start a", "end a", "start c", "end c"]
        );
        assert_eq!(debounce.status().in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_saves_without_guard() {
        let debounce = debounce(DebounceOptions::default());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            debounce.execute(move || async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), SaveError>(())
            });
            tokio::time::sleep(Duration::from_millis(1_500)).await;
        }

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_contextual_modifiers() {
        let options = DebounceOptions::default();
        let modify = |env: StaticEnvironment| apply_contextual_modifiers(2_000, &env, &options);

        assert_eq!(modify(StaticEnvironment::default()), 2_000);
        assert_eq!(modify(StaticEnvironment::offline()), 1_400);
        assert_eq!(
            modify(StaticEnvironment::offline().with_connection(ConnectionQuality::Slow)),
            1_400
        );
        assert_eq!(
            modify(StaticEnvironment::default().with_connection(ConnectionQuality::Slow)),
            2_400
        );
        assert_eq!(
            modify(
                StaticEnvironment::default()
                    .with_connection(ConnectionQuality::Slow)
                    .with_hardware(Some(2), None)
            ),
            3_120
        );
    }

    #[test]
    fn test_business_hours_modifier() {
        let mut options = DebounceOptions::default();
        let env = StaticEnvironment::default().with_hour(10);
        assert_eq!(apply_contextual_modifiers(2_000, &env, &options), 2_000);

        options.business_hours.enabled = true;
        assert_eq!(apply_contextual_modifiers(2_000, &env, &options), 2_200);
        let evening = StaticEnvironment::default().with_hour(20);
        assert_eq!(apply_contextual_modifiers(2_000, &evening, &options), 2_000);
    }

    #[test]
    fn test_learning_adjustment_for_fast_saver() {
        let clock = ManualClock::new(1_000_000);
        let debounce = AdaptiveDebounce::builder(2_000)
            .environment(StaticEnvironment::default())
            .clock(clock.clone())
            .build();

        assert_eq!(debounce.analyze_user_behavior_pattern(), UserBehavior::Learning);
        assert_eq!(debounce.apply_learning_adjustments(2_000), 2_000);

        for _ in 0..12 {
            clock.advance(3_000);
            debounce.record_execution(clock.now_ms(), 1_000);
        }
        assert_eq!(debounce.analyze_user_behavior_pattern(), UserBehavior::FastSaver);
        assert_eq!(debounce.apply_learning_adjustments(2_000), 1_600);
        // idle 1000 * 0.8, clamped to at least 500
        assert_eq!(debounce.calculate_adaptive_delay(), 800);
    }

    #[test]
    fn test_learning_disabled_skips_preferences() {
        let store = MemoryStore::new();
        let debounce = AdaptiveDebounce::builder(2_000)
            .options(DebounceOptions {
                enable_learning: false,
                ..Default::default()
            })
            .store(store.clone())
            .clock(ManualClock::new(0))
            .environment(StaticEnvironment::default())
            .build();

        debounce.execute_immediate(|| ());
        assert_eq!(debounce.executions().len(), 1);
        assert!(debounce.preferences().is_empty());
        assert_eq!(store.load(PREFERENCES_KEY).unwrap(), None);
    }

    #[test]
    fn test_concurrent_executions_persist_latest_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let debounce = AdaptiveDebounce::builder(2_000)
            .store(store.clone())
            .clock(ManualClock::new(0))
            .environment(StaticEnvironment::default())
            .build();

        std::thread::scope(|scope| {
            for thread in 0..8u64 {
                let debounce = debounce.clone();
                scope.spawn(move || {
                    for i in 0..2 {
                        debounce.record_execution(0, 1_000 + thread * 10 + i);
                    }
                });
            }
        });

        let in_memory = debounce.preferences();
        assert_eq!(in_memory.samples(TypingPattern::Idle).len(), 16);
        assert_eq!(LearnedPreferences::load(&store).unwrap(), in_memory);
        // Only the preferences file, no leftover temp files.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_save_persists_preferences() {
        let store = MemoryStore::new();
        let debounce = AdaptiveDebounce::builder(2_000)
            .store(store.clone())
            .environment(StaticEnvironment::default())
            .build();
        let calls = Arc::new(AtomicUsize::new(0));

        debounce.execute(counting_save(&calls));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stored = LearnedPreferences::load(&store).unwrap();
        assert_eq!(stored.samples(TypingPattern::Idle), &[1_000]);
    }

    #[test]
    fn test_debug_mode_toggle() {
        let debounce = debounce(DebounceOptions::default());
        assert!(!debounce.status().debug_mode);
        debounce.set_debug_mode(true);
        assert!(debounce.status().debug_mode);
        assert!(debounce.options().debug_mode);
    }

    proptest! {
        #[test]
        fn prop_delay_stays_within_bounds(
            base in 1u64..20_000,
            min in 0u64..3_000,
            span in 0u64..15_000,
            online in any::<bool>(),
            slow in any::<bool>(),
            cores in proptest::option::of(1u32..16),
            edits in 0usize..30,
            gap in 0u64..2_000,
        ) {
            let clock = ManualClock::new(0);
            let env = StaticEnvironment {
                online,
                connection: if slow { ConnectionQuality::Slow } else { ConnectionQuality::Fast },
                hardware_concurrency: cores,
                ..Default::default()
            };
            let options = DebounceOptions {
                min_delay_ms: min,
                max_delay_ms: min + span,
                ..Default::default()
            };
            let debounce = AdaptiveDebounce::builder(base)
                .options(options)
                .environment(env)
                .clock(clock.clone())
                .build();

            for i in 0..edits {
                clock.advance(gap);
                debounce.record_edit(EditKind::Insert, i, 3, "abc");
            }
            let delay = debounce.calculate_adaptive_delay();
            prop_assert!(delay >= min && delay <= min + span);
        }
    }
}
