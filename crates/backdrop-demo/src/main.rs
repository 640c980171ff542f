#![forbid(unsafe_code)]

//! Backdrop demo binary.
//!
//! Runs a page session against a simulated particle library and a
//! deterministic clock, persisting the theme the same way a native host would.

mod cli;
mod simulation;

use backdrop_runtime::{
    BackgroundConfig, FileStorage, PreferenceStorage, ThemePreferenceStore, ThemedEffects,
};
use std::error::Error;
use std::process;
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "demo";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn open_store(opts: &cli::Opts, key: &str) -> ThemePreferenceStore {
    if opts.in_memory {
        return ThemePreferenceStore::with_key(
            Box::new(backdrop_runtime::MemoryStorage::new()),
            key,
        );
    }

    let storage = match &opts.state_file {
        Some(path) => FileStorage::new(path),
        None => FileStorage::default_for_app(APP_NAME),
    };
    if !storage.is_available() {
        tracing::warn!(
            path = %storage.path().display(),
            "preference file not writable, theme will not persist"
        );
        return ThemePreferenceStore::with_key(
            Box::new(backdrop_runtime::MemoryStorage::new()),
            key,
        );
    }
    tracing::debug!(path = %storage.path().display(), "using preference file");
    ThemePreferenceStore::with_key(Box::new(storage), key)
}

fn run(opts: &cli::Opts) -> Result<(), Box<dyn Error>> {
    let effects = match &opts.effects {
        Some(path) => ThemedEffects::from_path(path)?,
        None => ThemedEffects::default(),
    };
    let config = BackgroundConfig::from_env();
    let store = open_store(opts, &config.storage_key);

    if opts.print_config {
        let params = effects.for_theme(store.theme()).to_particles_json();
        println!("{}", serde_json::to_string_pretty(&params)?);
        return Ok(());
    }

    let summary = simulation::run(opts, &store, effects, config);
    println!(
        "target #{}: {} toggles, final theme {}, final state {:?}",
        summary.target, summary.toggles, summary.final_theme, summary.final_state
    );
    println!(
        "handles created {}, released {}, transitions {}, polls {}, init failures {}",
        summary.stats.handles_created,
        summary.stats.handles_released,
        summary.stats.transitions,
        summary.stats.polls,
        summary.stats.init_failures
    );
    println!(
        "max concurrent handles {}, live after unmount {}",
        summary.max_concurrent, summary.live_after_unmount
    );
    Ok(())
}

fn main() {
    let opts = cli::Opts::parse();
    init_tracing();
    if let Err(e) = run(&opts) {
        eprintln!("backdrop-demo: {e}");
        process::exit(1);
    }
}
