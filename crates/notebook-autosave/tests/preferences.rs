use std::fs;

use notebook_autosave::{
    AdaptiveDebounce, Clock, DebounceOptions, EditKind, FileStore, LearnedPreferences, ManualClock,
    PREFERENCES_KEY, PreferenceStore, StaticEnvironment, TypingPattern,
};

fn debounce_with(store: FileStore, clock: &ManualClock) -> AdaptiveDebounce {
    AdaptiveDebounce::builder(2_000)
        .store(store)
        .clock(clock.clone())
        .environment(StaticEnvironment::default())
        .build()
}

#[test]
fn learned_preferences_survive_restart() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let clock = ManualClock::new(1_000_000);

    let first = debounce_with(FileStore::new(dir.path()), &clock);
    assert!(first.preferences().is_empty());

    // Idle save, then a paste, then a typing burst.
    first.execute_immediate(|| ());
    first.record_execution(clock.now_ms(), 1_000);

    first.record_edit(EditKind::Paste, 0, 400, &"p".repeat(400));
    first.record_execution(clock.now_ms(), 1_500);

    for i in 0..10 {
        clock.advance(150);
        first.record_edit(EditKind::Insert, 400 + i * 5, 5, &"x".repeat(405 + i * 5));
    }
    first.record_execution(clock.now_ms(), 4_000);

    let learned = first.preferences();
    assert_eq!(learned.samples(TypingPattern::Idle), &[0, 1_000]);
    assert_eq!(learned.samples(TypingPattern::Pasting), &[1_500]);
    assert_eq!(learned.samples(TypingPattern::FastTyping), &[4_000]);

    let path = FileStore::new(dir.path()).path_for(PREFERENCES_KEY);
    assert!(path.exists(), "preferences file written at {}", path.display());

    let second = debounce_with(FileStore::new(dir.path()), &clock);
    assert_eq!(second.preferences(), learned);
    // Execution history is per instance.
    assert!(second.executions().is_empty());
}

#[test]
fn preferences_file_is_plain_json() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = FileStore::new(dir.path());

    let mut prefs = LearnedPreferences::default();
    prefs.record(TypingPattern::SteadyTyping, 3_000);
    prefs.record(TypingPattern::Editing, 2_500);
    prefs.save(&store).expect("save preferences");

    let json = fs::read_to_string(store.path_for(PREFERENCES_KEY)).expect("read file");
    assert_eq!(json, r#"{"steady_typing":[3000],"editing":[2500]}"#);
    assert_eq!(LearnedPreferences::load(&store).expect("load"), prefs);
}

#[test]
fn corrupt_preferences_file_starts_fresh() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = FileStore::new(dir.path());
    fs::write(store.path_for(PREFERENCES_KEY), "{ not json").expect("write file");

    let clock = ManualClock::new(0);
    let debounce = debounce_with(store.clone(), &clock);
    assert!(debounce.preferences().is_empty());

    // The next execution overwrites the corrupt file.
    debounce.execute_immediate(|| ());
    let reloaded = LearnedPreferences::load(&store).expect("load after overwrite");
    assert_eq!(reloaded.samples(TypingPattern::Idle), &[0]);
}

#[test]
fn learning_disabled_leaves_store_untouched() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = FileStore::new(dir.path());
    let clock = ManualClock::new(0);

    let debounce = AdaptiveDebounce::builder(2_000)
        .options(DebounceOptions {
            enable_learning: false,
            ..Default::default()
        })
        .store(store.clone())
        .clock(clock)
        .environment(StaticEnvironment::default())
        .build();

    debounce.execute_immediate(|| ());
    debounce.record_execution(10, 2_000);
    assert_eq!(store.load(PREFERENCES_KEY).expect("load"), None);
}
