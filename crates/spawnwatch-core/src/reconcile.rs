//! Applies server snapshots to the entity stores.
//!
//! One call to [`ReconciliationEngine::apply_snapshot`] is one feed cycle.
//! For every kind the server reported on, all upserts happen before that
//! kind's sweep, so a record that extends an entry always beats the
//! entry's old expiry. Duplicate ids within a list resolve to the last
//! record. A kind the payload does not mention is left alone; an empty
//! list removes everything of that kind.
//!
//! Sightings are swept by [`is_valid`]. Territories and coverage zones are
//! swept by membership in the cycle's reported set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use spawnwatch_types::{
    CoverageZone, EncounterId, EntityKind, Sighting, Snapshot, TerritoryMarker,
};
use tracing::{debug, info, warn};

use crate::countdown::countdown_text;
use crate::expiry::is_valid;
use crate::notify::should_notify;
use crate::preferences::{FeedToggles, Preferences};
use crate::store::{Entity, EntityStore, UpsertOutcome};
use crate::surface::{CountdownLabel, RenderSurface, VisualSurface};

type Handle<S, E> = <S as VisualSurface<E>>::Handle;

/// What one cycle did to one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindReport {
    /// Whether the payload carried a list for this kind.
    pub reported: bool,
    /// Entries created.
    pub created: usize,
    /// Entries whose data changed.
    pub updated: usize,
    /// Entries removed by the sweep or by a disabled feed.
    pub removed: usize,
    /// Records dropped as malformed.
    pub dropped: usize,
}

impl KindReport {
    fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created = self.created.saturating_add(1),
            UpsertOutcome::Updated => self.updated = self.updated.saturating_add(1),
            UpsertOutcome::Unchanged => {}
        }
    }

    /// Whether the cycle changed nothing for this kind.
    pub const fn is_quiet(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0 && self.dropped == 0
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Sighting changes.
    pub sightings: KindReport,
    /// Territory changes.
    pub territories: KindReport,
    /// Coverage changes.
    pub coverage: KindReport,
    /// Alerts fired for newly arrived sightings.
    pub alerts: usize,
}

impl CycleReport {
    /// Report for one kind.
    pub const fn kind(&self, kind: EntityKind) -> &KindReport {
        match kind {
            EntityKind::Sighting => &self.sightings,
            EntityKind::Territory => &self.territories,
            EntityKind::Coverage => &self.coverage,
        }
    }

    /// Emit the report through `tracing`. Quiet cycles log at debug level.
    pub fn log(&self) {
        if self.sightings.is_quiet() && self.territories.is_quiet() && self.coverage.is_quiet() {
            debug!("snapshot reconciled, nothing changed");
            return;
        }
        info!(
            sightings_created = self.sightings.created,
            sightings_updated = self.sightings.updated,
            sightings_removed = self.sightings.removed,
            territories_created = self.territories.created,
            territories_updated = self.territories.updated,
            territories_removed = self.territories.removed,
            coverage_created = self.coverage.created,
            coverage_removed = self.coverage.removed,
            dropped = self
                .sightings
                .dropped
                .saturating_add(self.territories.dropped)
                .saturating_add(self.coverage.dropped),
            alerts = self.alerts,
            "snapshot reconciled"
        );
    }
}

/// Current contents of one store, for UI queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entities", rename_all = "snake_case")]
pub enum EntityListing {
    /// Live sightings in id order.
    Sightings(Vec<Sighting>),
    /// Live territory markers in id order.
    Territories(Vec<TerritoryMarker>),
    /// Live coverage zones in key order.
    Coverage(Vec<CoverageZone>),
}

impl EntityListing {
    /// Number of entities listed.
    pub fn len(&self) -> usize {
        match self {
            Self::Sightings(list) => list.len(),
            Self::Territories(list) => list.len(),
            Self::Coverage(list) => list.len(),
        }
    }

    /// Whether nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owns the stores and the surface, and turns snapshots into surface calls.
pub struct ReconciliationEngine<S: RenderSurface> {
    surface: S,
    sightings: EntityStore<Sighting, Handle<S, Sighting>>,
    territories: EntityStore<TerritoryMarker, Handle<S, TerritoryMarker>>,
    coverage: EntityStore<CoverageZone, Handle<S, CoverageZone>>,
    preferences: Preferences,
    last_snapshot: Option<Snapshot>,
    /// Encounters that already raised an alert, with the expiry that keeps
    /// them remembered.
    alerted: BTreeMap<EncounterId, DateTime<Utc>>,
}

impl<S: RenderSurface> ReconciliationEngine<S> {
    /// Create an engine with empty stores.
    pub const fn new(surface: S, preferences: Preferences) -> Self {
        Self {
            surface,
            sightings: EntityStore::new(),
            territories: EntityStore::new(),
            coverage: EntityStore::new(),
            preferences,
            last_snapshot: None,
            alerted: BTreeMap::new(),
        }
    }

    /// Reconcile every kind against a freshly fetched snapshot.
    ///
    /// The snapshot is kept so [`Self::force_reconcile_now`] can re-apply
    /// it later under different preferences.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> CycleReport {
        for rejection in &snapshot.rejections {
            warn!(
                kind = rejection.kind.as_str(),
                index = rejection.index,
                reason = %rejection.reason,
                "dropped malformed record"
            );
        }
        let mut report = self.reconcile(&snapshot, now);
        report.sightings.dropped = snapshot.rejected_count(EntityKind::Sighting);
        report.territories.dropped = snapshot.rejected_count(EntityKind::Territory);
        report.coverage.dropped = snapshot.rejected_count(EntityKind::Coverage);
        self.last_snapshot = Some(snapshot);
        report
    }

    /// Re-run reconciliation against the last snapshot under the current
    /// preferences, without fetching.
    ///
    /// The snapshot's malformed records were already reported when it was
    /// applied, so the returned report never counts them again.
    ///
    /// Before any snapshot has arrived this still sweeps sightings and
    /// clears disabled feeds.
    pub fn force_reconcile_now(&mut self, now: DateTime<Utc>) -> CycleReport {
        let show = self.preferences.show_coverage;
        self.coverage.set_visibility(show, &mut self.surface);

        match self.last_snapshot.take() {
            Some(last) => {
                let report = self.reconcile(&last, now);
                self.last_snapshot = Some(last);
                report
            }
            None => self.reconcile(&Snapshot::default(), now),
        }
    }

    /// Replace the preferences without reconciling.
    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    /// Replace the preferences and apply them to the map immediately.
    pub fn update_preferences(&mut self, preferences: Preferences, now: DateTime<Utc>) -> CycleReport {
        self.set_preferences(preferences);
        self.force_reconcile_now(now)
    }

    /// Current preferences.
    pub const fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Copy of every live entity of one kind.
    pub fn current_entities(&self, kind: EntityKind) -> EntityListing {
        match kind {
            EntityKind::Sighting => EntityListing::Sightings(self.sightings.snapshot()),
            EntityKind::Territory => EntityListing::Territories(self.territories.snapshot()),
            EntityKind::Coverage => EntityListing::Coverage(self.coverage.snapshot()),
        }
    }

    /// Countdown text for every rendered sighting at `now`.
    pub fn countdown_labels(&self, now: DateTime<Utc>) -> Vec<CountdownLabel> {
        self.sightings
            .iter()
            .map(|s| CountdownLabel {
                id: s.id.clone(),
                text: countdown_text(s.expires_at, now),
            })
            .collect()
    }

    /// Live sightings.
    pub const fn sightings(&self) -> &EntityStore<Sighting, Handle<S, Sighting>> {
        &self.sightings
    }

    /// Live territory markers.
    pub const fn territories(&self) -> &EntityStore<TerritoryMarker, Handle<S, TerritoryMarker>> {
        &self.territories
    }

    /// Live coverage zones.
    pub const fn coverage(&self) -> &EntityStore<CoverageZone, Handle<S, CoverageZone>> {
        &self.coverage
    }

    /// The surface being driven.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface, for status and countdown updates.
    pub const fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Release every visual of every kind. Returns how many were released.
    pub fn clear_all(&mut self) -> usize {
        let sightings = self.sightings.clear(&mut self.surface);
        let territories = self.territories.clear(&mut self.surface);
        let coverage = self.coverage.clear(&mut self.surface);
        sightings.saturating_add(territories).saturating_add(coverage)
    }

    /// Consume the engine, releasing every remaining visual, and return the
    /// surface.
    pub fn into_surface(mut self) -> S {
        let released = self.clear_all();
        debug!(released, "engine shut down, visuals released");
        self.surface
    }

    fn reconcile(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> CycleReport {
        let (sightings, alerts) = self.reconcile_sightings(snapshot.sightings.as_deref(), now);
        let territories = self.reconcile_territories(snapshot.territories.as_deref());
        let coverage = self.reconcile_coverage(snapshot.coverage.as_deref());

        CycleReport {
            sightings,
            territories,
            coverage,
            alerts,
        }
    }

    /// Upsert reported sightings, alert on arrivals, then sweep by expiry
    /// and filters.
    ///
    /// The sweep runs even when the payload carried no sighting list:
    /// expiry depends only on the clock.
    ///
    /// An encounter alerts at most once until it expires, even if it is
    /// hidden and shown again in between.
    fn reconcile_sightings(
        &mut self,
        reported: Option<&[Sighting]>,
        now: DateTime<Utc>,
    ) -> (KindReport, usize) {
        let mut report = KindReport {
            reported: reported.is_some(),
            ..KindReport::default()
        };
        self.alerted.retain(|_, expires_at| *expires_at > now);
        if !self.preferences.feeds.is_enabled(EntityKind::Sighting) {
            report.removed = self.sightings.clear(&mut self.surface);
            return (report, 0);
        }

        let mut alerts = 0_usize;
        for sighting in latest_by_id(reported.unwrap_or_default()) {
            let filters = &self.preferences.filters;
            if filters.is_excluded(sighting.species) {
                continue;
            }
            // An expired record may still refresh an entry already on the
            // map; the sweep below then decides whether it stays.
            if !is_valid(sighting, now, filters) && !self.sightings.contains(&sighting.id) {
                continue;
            }
            let outcome = self.sightings.upsert(sighting.clone(), &mut self.surface);
            report.count(outcome);
            if let Some(expires_at) = self.alerted.get_mut(&sighting.id) {
                *expires_at = (*expires_at).max(sighting.expires_at);
                continue;
            }
            if outcome == UpsertOutcome::Created
                && should_notify(sighting, &self.preferences.filters.notify)
            {
                debug!(encounter = %sighting.id, species = %sighting.species, "firing arrival alert");
                self.surface.fire_alert(sighting);
                self.alerted.insert(sighting.id.clone(), sighting.expires_at);
                alerts = alerts.saturating_add(1);
            }
        }

        let filters = &self.preferences.filters;
        report.removed = self
            .sightings
            .sweep(|s| is_valid(s, now, filters), &mut self.surface)
            .len();
        (report, alerts)
    }

    fn reconcile_territories(&mut self, reported: Option<&[TerritoryMarker]>) -> KindReport {
        let (report, _) = reconcile_presence(
            &mut self.territories,
            &mut self.surface,
            self.preferences.feeds,
            reported,
        );
        report
    }

    /// Coverage visuals are created visible; hide new ones when coverage
    /// display is off.
    fn reconcile_coverage(&mut self, reported: Option<&[CoverageZone]>) -> KindReport {
        let (report, created) = reconcile_presence(
            &mut self.coverage,
            &mut self.surface,
            self.preferences.feeds,
            reported,
        );
        if !self.preferences.show_coverage {
            for key in &created {
                self.coverage.set_visibility_of(key, false, &mut self.surface);
            }
        }
        report
    }
}

/// Reconcile a presence-based kind: upsert what was reported, then drop
/// whatever was not. Returns the report and the ids created.
fn reconcile_presence<E, V>(
    store: &mut EntityStore<E, V::Handle>,
    surface: &mut V,
    feeds: FeedToggles,
    reported: Option<&[E]>,
) -> (KindReport, Vec<E::Id>)
where
    E: Entity,
    V: VisualSurface<E>,
{
    let mut report = KindReport {
        reported: reported.is_some(),
        ..KindReport::default()
    };
    if !feeds.is_enabled(E::KIND) {
        report.removed = store.clear(surface);
        return (report, Vec::new());
    }
    let Some(reported) = reported else {
        return (report, Vec::new());
    };

    let mut created = Vec::new();
    let mut present = BTreeSet::new();
    for entity in latest_by_id(reported) {
        let id = entity.id();
        let outcome = store.upsert(entity.clone(), surface);
        if outcome == UpsertOutcome::Created {
            created.push(id.clone());
        }
        report.count(outcome);
        present.insert(id);
    }

    report.removed = store
        .sweep(|entity| present.contains(&entity.id()), surface)
        .len();
    (report, created)
}

/// Collapse duplicate ids, keeping the last record for each, in id order.
fn latest_by_id<E: Entity>(records: &[E]) -> impl Iterator<Item = &E> {
    let mut latest: BTreeMap<E::Id, &E> = BTreeMap::new();
    for record in records {
        latest.insert(record.id(), record);
    }
    latest.into_values()
}
