//! Poll loop driving the engine from a snapshot source.
//!
//! A [`PollScheduler`] runs two fixed-interval timers on one task:
//!
//! - **Feed cycle**: fetch a snapshot, reconcile it, update the connection
//!   indicator. A tick that arrives while a fetch is still pending is
//!   skipped, so fetches never overlap.
//! - **Countdown refresh**: recompute the remaining-time label of every
//!   rendered sighting. Read-only.
//!
//! The pending fetch is a future polled by the loop itself. Countdown
//! ticks and [`SchedulerHandle`] commands keep running while it is in
//! flight. A failed or timed-out fetch only flips the indicator to
//! disconnected; the stores keep what they had and the next tick tries
//! again.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use spawnwatch_types::{EntityKind, Snapshot, SnapshotError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::preferences::Preferences;
use crate::reconcile::{EntityListing, ReconciliationEngine};
use crate::surface::{ConnectionStatus, RenderSurface, StatusSurface};

/// Why a fetch produced no snapshot.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {message}")]
    Request {
        /// Transport error description.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("server returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not JSON.
    #[error("failed to decode response: {message}")]
    Decode {
        /// Decoder error description.
        message: String,
    },

    /// The response was JSON but not a snapshot.
    #[error("invalid snapshot: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: SnapshotError,
    },

    /// No response within the fetch timeout.
    #[error("fetch timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
}

/// Errors returned by [`SchedulerHandle`] methods.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The scheduler has stopped and no longer accepts commands.
    #[error("scheduler is not running")]
    Closed {
        /// The command that could not be delivered.
        #[from]
        source: mpsc::error::SendError<Command>,
    },

    /// The scheduler stopped before answering a query.
    #[error("scheduler stopped before replying")]
    NoReply {
        /// The underlying channel error.
        #[from]
        source: oneshot::error::RecvError,
    },
}

/// Where snapshots come from.
///
/// Implementations return an owned future so the scheduler can keep it
/// pending across loop iterations.
pub trait SnapshotSource {
    /// Fetch the current snapshot payload.
    fn fetch(&self) -> impl Future<Output = Result<Value, FetchError>> + Send + 'static;
}

/// Timer settings for a [`PollScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between feed cycles.
    pub feed_interval: Duration,
    /// Interval between countdown refreshes.
    pub countdown_interval: Duration,
    /// How long a fetch may take before it counts as failed.
    pub fetch_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            feed_interval: Duration::from_millis(5000),
            countdown_interval: Duration::from_millis(1000),
            fetch_timeout: Duration::from_millis(4000),
        }
    }
}

/// Requests sent to a running scheduler.
#[derive(Debug)]
pub enum Command {
    /// Replace the preferences and re-apply the last snapshot under them.
    UpdatePreferences(Preferences),
    /// Re-apply the last snapshot under the current preferences.
    ForceReconcile,
    /// Report the live entities of one kind.
    CurrentEntities {
        /// Kind to list.
        kind: EntityKind,
        /// Where to send the listing.
        reply: oneshot::Sender<EntityListing>,
    },
    /// Stop the loop.
    Shutdown,
}

/// Cloneable handle for controlling a running [`PollScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    /// Replace the preferences. Takes effect on the map immediately.
    pub fn update_preferences(&self, preferences: Preferences) -> Result<(), SchedulerError> {
        self.commands.send(Command::UpdatePreferences(preferences))?;
        Ok(())
    }

    /// Re-apply the last snapshot without fetching.
    pub fn force_reconcile(&self) -> Result<(), SchedulerError> {
        self.commands.send(Command::ForceReconcile)?;
        Ok(())
    }

    /// Live entities of one kind.
    pub async fn current_entities(&self, kind: EntityKind) -> Result<EntityListing, SchedulerError> {
        let (reply, listing) = oneshot::channel();
        self.commands.send(Command::CurrentEntities { kind, reply })?;
        Ok(listing.await?)
    }

    /// Ask the loop to stop after the current step.
    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        self.commands.send(Command::Shutdown)?;
        Ok(())
    }

    /// Whether the scheduler has stopped and dropped its command queue.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

type PendingFetch = Pin<Box<dyn Future<Output = Result<Value, FetchError>> + Send>>;

/// Drives a [`ReconciliationEngine`] from a [`SnapshotSource`] on timers.
pub struct PollScheduler<F, S: RenderSurface> {
    source: F,
    engine: ReconciliationEngine<S>,
    config: SchedulerConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    status: ConnectionStatus,
}

impl<F, S> PollScheduler<F, S>
where
    F: SnapshotSource,
    S: RenderSurface + StatusSurface,
{
    /// Create a scheduler and the handle used to control it.
    pub fn new(
        source: F,
        engine: ReconciliationEngine<S>,
        config: SchedulerConfig,
    ) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            source,
            engine,
            config,
            commands: rx,
            status: ConnectionStatus::Connecting,
        };
        (scheduler, SchedulerHandle { commands: tx })
    }

    /// Current connection status.
    pub const fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Run until [`SchedulerHandle::shutdown`] is called, then hand the
    /// engine back.
    ///
    /// The first feed cycle and countdown refresh start immediately. If
    /// every handle is dropped the loop keeps polling without commands.
    pub async fn run(mut self) -> ReconciliationEngine<S> {
        info!(
            feed_interval_ms = duration_ms(self.config.feed_interval),
            countdown_interval_ms = duration_ms(self.config.countdown_interval),
            fetch_timeout_ms = duration_ms(self.config.fetch_timeout),
            "poll scheduler starting"
        );
        self.engine.surface_mut().show_status(&self.status);

        let mut feed = tokio::time::interval_at(Instant::now(), self.config.feed_interval);
        feed.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut countdown = tokio::time::interval_at(Instant::now(), self.config.countdown_interval);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending: Option<PendingFetch> = None;
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = feed.tick() => {
                    if pending.is_some() {
                        debug!("previous fetch still in flight, skipping feed tick");
                    } else {
                        pending = Some(self.start_fetch());
                    }
                }
                result = wait_pending(&mut pending), if pending.is_some() => {
                    pending = None;
                    self.finish_fetch(result);
                }
                _ = countdown.tick() => self.refresh_countdowns(),
                command = self.commands.recv(), if commands_open => match command {
                    Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all scheduler handles dropped");
                        commands_open = false;
                    }
                },
            }
        }

        info!("poll scheduler stopped");
        self.engine
    }

    fn start_fetch(&self) -> PendingFetch {
        let fetch = self.source.fetch();
        let limit = self.config.fetch_timeout;
        Box::pin(async move {
            match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout {
                    timeout_ms: duration_ms(limit),
                }),
            }
        })
    }

    fn finish_fetch(&mut self, result: Result<Value, FetchError>) {
        let now = Utc::now();
        let snapshot = result.and_then(|body| Ok(Snapshot::from_json(&body)?));
        self.status = match snapshot {
            Ok(snapshot) => {
                let health = snapshot.health.clone();
                let report = self.engine.apply_snapshot(snapshot, now);
                report.log();
                ConnectionStatus::Connected { at: now, health }
            }
            Err(e) => {
                warn!(error = %e, "snapshot fetch failed, keeping current map");
                let since = match &self.status {
                    ConnectionStatus::Disconnected { since, .. } => *since,
                    _ => now,
                };
                ConnectionStatus::Disconnected {
                    since,
                    reason: e.to_string(),
                }
            }
        };
        self.engine.surface_mut().show_status(&self.status);
    }

    fn refresh_countdowns(&mut self) {
        let labels = self.engine.countdown_labels(Utc::now());
        self.engine.surface_mut().show_countdowns(&labels);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::UpdatePreferences(preferences) => {
                info!(
                    excluded = preferences.filters.excluded.len(),
                    notify = preferences.filters.notify.len(),
                    show_coverage = preferences.show_coverage,
                    "preferences updated"
                );
                self.engine.update_preferences(preferences, Utc::now()).log();
            }
            Command::ForceReconcile => {
                self.engine.force_reconcile_now(Utc::now()).log();
            }
            Command::CurrentEntities { kind, reply } => {
                if reply.send(self.engine.current_entities(kind)).is_err() {
                    debug!(kind = kind.as_str(), "entity listing requester went away");
                }
            }
            Command::Shutdown => {}
        }
    }
}

async fn wait_pending(pending: &mut Option<PendingFetch>) -> Result<Value, FetchError> {
    match pending {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use spawnwatch_types::{EncounterId, SpeciesId};

    use super::*;
    use crate::test_support::RecordingSurface;

    /// Source replaying scripted responses, each after an optional delay.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        script: Arc<Mutex<VecDeque<(Duration, Result<Value, FetchError>)>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn push(&self, delay_ms: u64, response: Result<Value, FetchError>) {
            self.script
                .lock()
                .unwrap()
                .push_back((Duration::from_millis(delay_ms), response));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SnapshotSource for ScriptedSource {
        fn fetch(&self) -> impl Future<Output = Result<Value, FetchError>> + Send + 'static {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            async move {
                match next {
                    Some((delay, response)) => {
                        tokio::time::sleep(delay).await;
                        response
                    }
                    None => Err(FetchError::Status { status: 503 }),
                }
            }
        }
    }

    fn payload(species: u16) -> Value {
        let expires = Utc::now().timestamp_millis() + 3_600_000;
        json!({
            "pokemons": [{
                "encounter_id": "a1",
                "pokemon_id": species,
                "latitude": 10.0,
                "longitude": 20.0,
                "disappear_time": expires
            }],
            "health": {"scanner": "ok"}
        })
    }

    async fn run_for(
        source: ScriptedSource,
        config: SchedulerConfig,
        millis: u64,
    ) -> ReconciliationEngine<RecordingSurface> {
        let engine = ReconciliationEngine::new(RecordingSurface::default(), Preferences::default());
        let (scheduler, handle) = PollScheduler::new(source, engine, config);
        let stop = async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            handle.shutdown().unwrap();
        };
        let (engine, ()) = tokio::join!(scheduler.run(), stop);
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_disconnects_and_keeps_stores() {
        let source = ScriptedSource::default();
        source.push(0, Ok(payload(4)));
        source.push(0, Err(FetchError::Status { status: 500 }));

        let engine = run_for(source.clone(), SchedulerConfig::default(), 5_500).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(engine.sightings().len(), 1);
        assert!(engine.surface().destroyed.is_empty());

        let statuses = &engine.surface().statuses;
        assert_eq!(statuses.first(), Some(&ConnectionStatus::Connecting));
        assert!(matches!(statuses.get(1), Some(ConnectionStatus::Connected { health: Some(_), .. })));
        assert!(matches!(
            statuses.last(),
            Some(ConnectionStatus::Disconnected { reason, .. }) if reason.contains("500")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_keep_the_first_failure_time() {
        let source = ScriptedSource::default();
        let engine = run_for(source, SchedulerConfig::default(), 5_500).await;

        let since: Vec<_> = engine
            .surface()
            .statuses
            .iter()
            .filter_map(|s| match s {
                ConnectionStatus::Disconnected { since, .. } => Some(*since),
                _ => None,
            })
            .collect();
        assert_eq!(since.len(), 2);
        assert_eq!(since.first(), since.last());
    }

    #[tokio::test(start_paused = true)]
    async fn countdowns_tick_while_fetch_is_pending() {
        let source = ScriptedSource::default();
        source.push(3_500, Ok(payload(4)));

        let engine = run_for(source.clone(), SchedulerConfig::default(), 3_200).await;

        assert_eq!(source.calls(), 1);
        assert_eq!(engine.surface().countdowns.len(), 4);
        assert_eq!(engine.surface().statuses, vec![ConnectionStatus::Connecting]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let source = ScriptedSource::default();
        source.push(10_000, Ok(payload(4)));

        let engine = run_for(source.clone(), SchedulerConfig::default(), 4_500).await;

        assert!(engine.sightings().is_empty());
        assert!(matches!(
            engine.surface().statuses.last(),
            Some(ConnectionStatus::Disconnected { reason, .. }) if reason.contains("timed out")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_never_overlap() {
        let source = ScriptedSource::default();
        source.push(2_500, Ok(payload(4)));
        source.push(2_500, Ok(payload(4)));
        let config = SchedulerConfig {
            feed_interval: Duration::from_millis(1_000),
            ..SchedulerConfig::default()
        };

        // Fetches start at 0s and 3s; the ticks at 1s, 2s, 4s and 5s find
        // one still pending.
        let engine = run_for(source.clone(), config, 5_200).await;

        assert_eq!(source.calls(), 2);
        assert_eq!(engine.sightings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_update_preferences_and_answer_queries() {
        let source = ScriptedSource::default();
        source.push(0, Ok(payload(16)));

        let engine = ReconciliationEngine::new(RecordingSurface::default(), Preferences::default());
        let (scheduler, handle) = PollScheduler::new(source, engine, SchedulerConfig::default());
        let driver = async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let before = handle.current_entities(EntityKind::Sighting).await.unwrap();

            let mut preferences = Preferences::default();
            preferences.filters.excluded.insert(SpeciesId(16));
            handle.update_preferences(preferences).unwrap();
            let after = handle.current_entities(EntityKind::Sighting).await.unwrap();

            handle.shutdown().unwrap();
            (before, after)
        };

        let (engine, (before, after)) = tokio::join!(scheduler.run(), driver);

        assert_eq!(before.len(), 1);
        assert!(after.is_empty());
        assert!(!engine.sightings().contains(&EncounterId::new("a1")));
        engine.surface().assert_released_once();
    }

    #[tokio::test]
    async fn handle_reports_a_stopped_scheduler() {
        let engine = ReconciliationEngine::new(RecordingSurface::default(), Preferences::default());
        let (scheduler, handle) =
            PollScheduler::new(ScriptedSource::default(), engine, SchedulerConfig::default());
        assert!(!handle.is_closed());
        drop(scheduler);

        assert!(handle.is_closed());
        assert!(matches!(handle.force_reconcile(), Err(SchedulerError::Closed { .. })));
    }
}
