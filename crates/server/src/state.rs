use std::path::{Path, PathBuf};

use crosstag_core::{Config, Injector, SanitizedConfig, TrackerLookups};
use tokio::sync::{Mutex, MutexGuard};

/// Shared application state
pub struct AppState {
    config: Config,
    lookups: TrackerLookups,
    injector: Option<Injector>,
    input_directory: PathBuf,
    /// Held for the duration of each regeneration; files are processed
    /// one at a time.
    scan_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        lookups: TrackerLookups,
        injector: Option<Injector>,
        input_directory: PathBuf,
    ) -> Self {
        Self {
            config,
            lookups,
            injector,
            input_directory,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn lookups(&self) -> &TrackerLookups {
        &self.lookups
    }

    pub fn injector(&self) -> Option<&Injector> {
        self.injector.as_ref()
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.config.paths.output_directory
    }

    pub async fn lock_scans(&self) -> MutexGuard<'_, ()> {
        self.scan_lock.lock().await
    }
}
