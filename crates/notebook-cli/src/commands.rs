use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use notebook_autosave::{
    AutoSaveSettings, FileStore, LearnedPreferences, PREFERENCES_KEY, PreferenceStore, StoreError,
};
use notebook_cli::replay::{load_script, replay};
use notebook_cli::report::{preferences_table, replay_summary, replay_table};

use crate::cli::{OutputFormatArg, PrefsClearArgs, PrefsShowArgs, ReplayArgs};

pub fn run_replay(args: &ReplayArgs) -> Result<()> {
    let mut settings = match &args.settings {
        Some(path) => AutoSaveSettings::load_from(path)
            .with_context(|| format!("load settings {}", path.display()))?,
        None => AutoSaveSettings::default(),
    };
    if let Some(base_delay) = args.base_delay {
        settings.base_delay_ms = base_delay;
    }
    settings.validate().context("validate settings")?;

    let events = load_script(&args.script)?;
    info!(events = events.len(), script = %args.script.display(), "Replaying edit script");
    let report = replay(&events, &settings);

    match args.format {
        OutputFormatArg::Text => {
            println!("{}", replay_table(&report));
            println!("{}", replay_summary(&report));
        }
        OutputFormatArg::Json => {
            println!("{}", serde_json::to_string_pretty(&report).context("encode report")?);
        }
    }
    Ok(())
}

pub fn run_prefs_show(args: &PrefsShowArgs) -> Result<()> {
    let store = open_store(args.dir.as_deref());
    let preferences = LearnedPreferences::load(&store).map_err(|e| describe_store_error(&e))?;

    match args.format {
        OutputFormatArg::Text if preferences.is_empty() => {
            println!("No learned preferences in {}", store.dir().display());
        }
        OutputFormatArg::Text => {
            println!("Preferences: {}", store.path_for(PREFERENCES_KEY).display());
            println!("{}", preferences_table(&preferences));
        }
        OutputFormatArg::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&preferences).context("encode preferences")?
            );
        }
    }
    Ok(())
}

pub fn run_prefs_clear(args: &PrefsClearArgs) -> Result<()> {
    let store = open_store(args.dir.as_deref());
    store
        .remove(PREFERENCES_KEY)
        .map_err(|e| describe_store_error(&e))?;
    println!("Cleared learned preferences in {}", store.dir().display());
    Ok(())
}

fn open_store(dir: Option<&Path>) -> FileStore {
    let store = match dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::open_default(),
    };
    debug!(dir = %store.dir().display(), "Using preference store");
    store
}

fn describe_store_error(error: &StoreError) -> anyhow::Error {
    match error.suggestion() {
        Some(hint) => anyhow!("{}\nhint: {}", error.user_message(), hint),
        None => anyhow!("{}", error.user_message()),
    }
}
