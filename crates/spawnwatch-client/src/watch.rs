//! Preferences file watcher.
//!
//! Polls the preferences file's modification time and pushes a freshly
//! loaded [`Preferences`] to the scheduler whenever it changes. Deleting
//! the file restores the defaults.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use spawnwatch_core::preferences::Preferences;
use spawnwatch_core::scheduler::SchedulerHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Watch `path` every `every` until the scheduler stops.
pub async fn watch_preferences(path: PathBuf, every: Duration, handle: SchedulerHandle) {
    let mut last_seen = modified_at(&path);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the file was loaded at startup.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if handle.is_closed() {
            debug!("scheduler stopped, preferences watcher exiting");
            return;
        }
        let current = modified_at(&path);
        if current == last_seen {
            continue;
        }
        last_seen = current;

        let preferences = Preferences::load_lossy(&path);
        info!(
            path = %path.display(),
            excluded = preferences.filters.excluded.len(),
            notify = preferences.filters.notify.len(),
            "preferences file changed, reloading"
        );
        if handle.update_preferences(preferences).is_err() {
            debug!("scheduler stopped, preferences watcher exiting");
            return;
        }
    }
}

fn modified_at(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
