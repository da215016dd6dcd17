//! Auto-save for one open note or task.
//!
//! A [`DocumentSession`] glues the adaptive debounce to the editor: every
//! edit is recorded, the document is marked dirty, and a debounced save of
//! the latest content is scheduled through a [`SaveCollaborator`].
//! [`DocumentSession::flush`] is the backstop for blur and navigation: it
//! saves right away and reports failures to the caller.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::debounce::{AdaptiveDebounce, AutoSaveSettings};
use crate::error::SaveError;
use crate::tracker::EditKind;

/// Writing direction of the note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

/// Content handed to the save collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRequest {
    pub item_id: String,
    pub content: String,
    pub direction: TextDirection,
}

/// Persists note content, typically through the notes API.
///
/// Saves may be repeated with the same content and may overlap.
pub trait SaveCollaborator: Send + Sync + 'static {
    fn save(&self, request: SaveRequest) -> impl Future<Output = Result<(), SaveError>> + Send;
}

/// Tracks unsaved changes in a document.
///
/// Times are milliseconds on the debounce clock.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    /// Whether there are unsaved changes.
    dirty: bool,

    /// When the most recent change was made.
    last_change: Option<u64>,

    /// When the first unsaved change was made.
    /// Reset when saved.
    first_unsaved_change: Option<u64>,

    /// First change made after the running save took its snapshot.
    first_change_during_save: Option<u64>,

    /// Whether a save is currently in progress.
    saving: bool,
}

impl DirtyTracker {
    /// Create a new tracker with no unsaved changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there are unsaved changes.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check if a save is in progress.
    #[inline]
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Mark the document as having unsaved changes.
    pub fn mark_dirty(&mut self, now: u64) {
        self.dirty = true;
        self.last_change = Some(now);

        // Only set first_unsaved_change if this is the first change since last save
        if self.first_unsaved_change.is_none() {
            self.first_unsaved_change = Some(now);
        }
        if self.saving && self.first_change_during_save.is_none() {
            self.first_change_during_save = Some(now);
        }
    }

    /// Mark that a save has started.
    pub fn start_save(&mut self) {
        self.saving = true;
        self.first_change_during_save = None;
    }

    /// Mark that a save of the latest content completed.
    pub fn save_complete(&mut self) {
        self.dirty = false;
        self.saving = false;
        self.first_unsaved_change = None;
        self.first_change_during_save = None;
    }

    /// Mark that a save completed but newer edits arrived meanwhile.
    ///
    /// Only those newer edits remain unsaved.
    pub fn save_superseded(&mut self) {
        self.saving = false;
        if let Some(first) = self.first_change_during_save {
            self.first_unsaved_change = Some(first);
        }
    }

    /// Mark that a save has failed.
    pub fn save_failed(&mut self) {
        self.saving = false;
        // Keep dirty = true since save failed
    }

    /// Milliseconds since the last change.
    pub fn ms_since_last_change(&self, now: u64) -> Option<u64> {
        self.last_change.map(|t| now.saturating_sub(t))
    }

    /// Milliseconds since the first unsaved change.
    pub fn ms_since_first_unsaved(&self, now: u64) -> Option<u64> {
        self.first_unsaved_change.map(|t| now.saturating_sub(t))
    }
}

/// What [`DocumentSession::on_edit`] did with the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// A debounced save was armed with this delay.
    Scheduled(u64),
    /// Edits stayed unsaved too long; a save was started right away.
    ForcedSave,
    /// Auto-save is disabled; the document stays dirty until flushed.
    Disabled,
}

#[derive(Debug)]
struct SessionState {
    item_id: String,
    content: String,
    direction: TextDirection,
    revision: u64,
    dirty: DirtyTracker,
}

/// Auto-save driver for the currently open document.
pub struct DocumentSession<S: SaveCollaborator> {
    debounce: AdaptiveDebounce,
    collaborator: Arc<S>,
    settings: AutoSaveSettings,
    state: Arc<Mutex<SessionState>>,
}

impl<S: SaveCollaborator> DocumentSession<S> {
    /// Open `item_id` with empty, left-to-right content.
    pub fn new(
        item_id: impl Into<String>,
        debounce: AdaptiveDebounce,
        collaborator: S,
        settings: AutoSaveSettings,
    ) -> Self {
        Self {
            debounce,
            collaborator: Arc::new(collaborator),
            settings,
            state: Arc::new(Mutex::new(SessionState {
                item_id: item_id.into(),
                content: String::new(),
                direction: TextDirection::default(),
                revision: 0,
                dirty: DirtyTracker::new(),
            })),
        }
    }

    /// Handle an editor change; `content` is the full document after it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while auto-save is enabled.
    pub fn on_edit(
        &self,
        kind: EditKind,
        position: usize,
        length: usize,
        content: impl Into<String>,
    ) -> EditOutcome {
        let content = content.into();
        self.debounce.record_edit(kind, position, length, &content);

        let now = self.debounce.now_ms();
        let overdue = {
            let mut state = self.state.lock();
            state.content = content;
            state.revision += 1;
            state.dirty.mark_dirty(now);
            state
                .dirty
                .ms_since_first_unsaved(now)
                .is_some_and(|ms| self.settings.is_overdue(ms))
        };

        if !self.settings.should_schedule() {
            return EditOutcome::Disabled;
        }

        if overdue {
            tracing::debug!(
                "Unsaved changes exceeded {} ms, saving now",
                self.settings.max_unsaved_ms
            );
            let save = self.latest_save();
            self.debounce.execute_immediate(move || {
                tokio::spawn(async move {
                    if let Err(e) = save.await {
                        tracing::error!("Forced auto-save failed: {}", e);
                    }
                });
            });
            return EditOutcome::ForcedSave;
        }

        let save = self.latest_save();
        EditOutcome::Scheduled(self.debounce.execute(move || save))
    }

    /// Save the latest content now if it is dirty, cancelling any armed timer.
    ///
    /// Returns whether a save was performed.
    pub async fn flush(&self) -> Result<bool, SaveError> {
        let dirty = self.state.lock().dirty.is_dirty();
        if !dirty {
            self.debounce.cancel();
            return Ok(false);
        }

        let save = self.latest_save();
        self.debounce.execute_immediate(move || save).await?;
        Ok(true)
    }

    /// Flush the current document, then start tracking `item_id`.
    ///
    /// If the flush fails the current document stays open.
    pub async fn switch_document(
        &self,
        item_id: impl Into<String>,
        content: impl Into<String>,
        direction: TextDirection,
    ) -> Result<(), SaveError> {
        self.flush().await?;
        self.debounce.reset();

        let mut state = self.state.lock();
        state.item_id = item_id.into();
        state.content = content.into();
        state.direction = direction;
        state.revision = 0;
        state.dirty = DirtyTracker::new();
        Ok(())
    }

    pub fn set_direction(&self, direction: TextDirection) {
        self.state.lock().direction = direction;
    }

    pub fn item_id(&self) -> String {
        self.state.lock().item_id.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty.is_dirty()
    }

    pub fn is_saving(&self) -> bool {
        self.state.lock().dirty.is_saving()
    }

    pub fn debounce(&self) -> &AdaptiveDebounce {
        &self.debounce
    }

    fn latest_save(&self) -> impl Future<Output = Result<(), SaveError>> + Send + use<S> {
        save_latest(Arc::clone(&self.state), Arc::clone(&self.collaborator))
    }
}

/// Save whatever content is current when the save actually starts.
async fn save_latest<S: SaveCollaborator>(
    state: Arc<Mutex<SessionState>>,
    collaborator: Arc<S>,
) -> Result<(), SaveError> {
    let (request, revision) = {
        let mut state = state.lock();
        if !state.dirty.is_dirty() {
            return Ok(());
        }
        state.dirty.start_save();
        let request = SaveRequest {
            item_id: state.item_id.clone(),
            content: state.content.clone(),
            direction: state.direction,
        };
        (request, state.revision)
    };
    let item_id = request.item_id.clone();

    let result = collaborator.save(request).await;

    let mut state = state.lock();
    if state.item_id != item_id {
        // Document was switched while the save ran.
        return result;
    }
    match &result {
        Ok(()) if state.revision == revision => state.dirty.save_complete(),
        Ok(()) => state.dirty.save_superseded(),
        Err(_) => state.dirty.save_failed(),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticEnvironment;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCollaborator {
        saved: Arc<Mutex<Vec<SaveRequest>>>,
        fail: Arc<AtomicBool>,
    }

    impl SaveCollaborator for RecordingCollaborator {
        async fn save(&self, request: SaveRequest) -> Result<(), SaveError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SaveError::failed(request.item_id, "server unavailable"));
            }
            self.saved.lock().push(request);
            Ok(())
        }
    }

    /// Takes three seconds per save.
    #[derive(Default)]
    struct SlowCollaborator {
        saved: Arc<Mutex<Vec<SaveRequest>>>,
    }

    impl SaveCollaborator for SlowCollaborator {
        async fn save(&self, request: SaveRequest) -> Result<(), SaveError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            self.saved.lock().push(request);
            Ok(())
        }
    }

    fn session(
        settings: AutoSaveSettings,
    ) -> (
        DocumentSession<RecordingCollaborator>,
        Arc<Mutex<Vec<SaveRequest>>>,
        Arc<AtomicBool>,
    ) {
        let collaborator = RecordingCollaborator::default();
        let saved = Arc::clone(&collaborator.saved);
        let fail = Arc::clone(&collaborator.fail);
        let debounce = AdaptiveDebounce::from_settings(&settings)
            .environment(StaticEnvironment::default())
            .build();
        (
            DocumentSession::new("note-1", debounce, collaborator, settings),
            saved,
            fail,
        )
    }

    fn contents(saved: &Mutex<Vec<SaveRequest>>) -> Vec<String> {
        saved.lock().iter().map(|r| r.content.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_save_uses_latest_content() {
        let (session, saved, _) = session(AutoSaveSettings::default());

        assert_eq!(session.on_edit(EditKind::Insert, 0, 1, "H"), EditOutcome::Scheduled(2_000));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(
            session.on_edit(EditKind::Insert, 1, 1, "Hi"),
            EditOutcome::Scheduled(_)
        ));
        assert!(session.is_dirty());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(contents(&saved), vec!["Hi"]);
        assert_eq!(saved.lock()[0].item_id, "note-1");
        assert!(!session.is_dirty());
        assert!(!session.is_saving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_immediately() {
        let (session, saved, _) = session(AutoSaveSettings::default());
        assert!(!session.flush().await.unwrap());

        session.set_direction(TextDirection::Rtl);
        session.on_edit(EditKind::Paste, 0, 5, "שלום!");
        assert!(session.flush().await.unwrap());
        assert!(!session.debounce().is_pending());
        assert_eq!(saved.lock()[0].direction, TextDirection::Rtl);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(saved.lock().len(), 1);
        assert!(!session.flush().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_document_dirty() {
        let (session, saved, fail) = session(AutoSaveSettings::default());
        fail.store(true, Ordering::SeqCst);

        session.on_edit(EditKind::Insert, 0, 3, "abc");
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(session.is_dirty());
        assert!(!session.is_saving());

        let error = session.flush().await.unwrap_err();
        assert_eq!(error.to_string(), "Failed to save item note-1");

        fail.store(false, Ordering::SeqCst);
        assert!(session.flush().await.unwrap());
        assert_eq!(contents(&saved), vec!["abc"]);
        assert!(!session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_document_flushes_and_resets() {
        let (session, saved, _) = session(AutoSaveSettings::default());
        session.on_edit(EditKind::Insert, 0, 5, "draft");

        session
            .switch_document("task-7", "Buy milk", TextDirection::Ltr)
            .await
            .unwrap();
        assert_eq!(contents(&saved), vec!["draft"]);
        assert_eq!(session.item_id(), "task-7");
        assert!(!session.is_dirty());
        assert!(session.debounce().debug_info().recent_activity.is_empty());

        session.on_edit(EditKind::Insert, 8, 1, "Buy milk!");
        tokio::time::sleep(Duration::from_secs(15)).await;
        let last = saved.lock().last().cloned().unwrap();
        assert_eq!(last.item_id, "task-7");
        assert_eq!(last.content, "Buy milk!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_unsaved_stretch_forces_save() {
        let settings = AutoSaveSettings {
            max_unsaved_ms: 3_000,
            ..Default::default()
        };
        let (session, saved, _) = session(settings);

        let mut content = String::new();
        let mut outcomes = Vec::new();
        for i in 0..5 {
            content.push('x');
            outcomes.push(session.on_edit(EditKind::Insert, i, 1, content.clone()));
            tokio::time::sleep(Duration::from_millis(1_000)).await;
        }

        assert!(matches!(outcomes[0], EditOutcome::Scheduled(_)));
        assert_eq!(outcomes[3], EditOutcome::ForcedSave);
        assert_eq!(contents(&saved)[0], "xxxx");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_settings_never_schedule() {
        let (session, saved, _) = session(AutoSaveSettings::disabled());
        assert_eq!(session.on_edit(EditKind::Insert, 0, 1, "a"), EditOutcome::Disabled);
        assert!(!session.debounce().is_pending());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(saved.lock().is_empty());
        assert!(session.flush().await.unwrap());
        assert_eq!(contents(&saved), vec!["a"]);
    }

    #[test]
    fn test_dirty_tracker_lifecycle() {
        let mut tracker = DirtyTracker::new();
        assert!(!tracker.is_dirty());

        tracker.mark_dirty(100);
        tracker.mark_dirty(400);
        assert_eq!(tracker.ms_since_last_change(1_000), Some(600));
        assert_eq!(tracker.ms_since_first_unsaved(1_000), Some(900));

        tracker.start_save();
        tracker.save_failed();
        assert!(tracker.is_dirty());
        assert!(!tracker.is_saving());

        tracker.start_save();
        tracker.save_complete();
        assert!(!tracker.is_dirty());
        assert_eq!(tracker.ms_since_first_unsaved(1_000), None);
    }

    #[test]
    fn test_superseded_save_restarts_unsaved_clock() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_dirty(100);
        tracker.start_save();
        tracker.mark_dirty(2_500);
        tracker.mark_dirty(2_800);
        tracker.save_superseded();

        assert!(tracker.is_dirty());
        assert!(!tracker.is_saving());
        assert_eq!(tracker.ms_since_first_unsaved(3_000), Some(500));
        assert_eq!(tracker.ms_since_last_change(3_000), Some(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_save_does_not_force_early() {
        let settings = AutoSaveSettings {
            max_unsaved_ms: 3_000,
            ..Default::default()
        };
        let collaborator = SlowCollaborator::default();
        let saved = Arc::clone(&collaborator.saved);
        let debounce = AdaptiveDebounce::from_settings(&settings)
            .environment(StaticEnvironment::default())
            .build();
        let session = DocumentSession::new("note-1", debounce, collaborator, settings);

        session.on_edit(EditKind::Insert, 0, 1, "a");
        let save = tokio::spawn(session.latest_save());
        // Edit while the save of "a" is still running.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        session.on_edit(EditKind::Insert, 1, 1, "ab");
        save.await.unwrap().unwrap();
        assert!(session.is_dirty());
        assert_eq!(contents(&saved), vec!["a"]);

        // 4.5 s after "a" was first typed, but only 2 s after "ab".
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(matches!(
            session.on_edit(EditKind::Insert, 2, 1, "abc"),
            EditOutcome::Scheduled(_)
        ));
    }
}
