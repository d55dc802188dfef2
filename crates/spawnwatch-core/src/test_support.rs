//! Shared fixtures for unit tests: a recording surface and entity builders.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use spawnwatch_types::{
    CoverageZone, EncounterId, Faction, Position, Sighting, SpeciesId, TerritoryId,
    TerritoryMarker,
};

use crate::surface::{AlertSink, ConnectionStatus, CountdownLabel, StatusSurface, VisualSurface};

/// Fixed reference instant so expiry arithmetic in tests is deterministic.
pub(crate) fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

pub(crate) fn in_seconds(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

pub(crate) fn sighting(id: &str, species: u16, expires_at: DateTime<Utc>) -> Sighting {
    Sighting {
        id: EncounterId::new(id),
        species: SpeciesId(species),
        name: None,
        position: Position::new(10.0, 20.0),
        expires_at,
    }
}

pub(crate) fn territory(id: &str, faction: Faction, strength: u32) -> TerritoryMarker {
    TerritoryMarker {
        id: TerritoryId::new(id),
        position: Position::new(10.5, 20.5),
        faction,
        strength,
    }
}

pub(crate) fn zone(latitude: f64, longitude: f64, radius_m: f64) -> CoverageZone {
    CoverageZone::new(Position::new(latitude, longitude), radius_m)
}

/// Handle issued by [`RecordingSurface`]. Deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Visual(u64);

/// Surface that records every call it receives.
#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    next_handle: u64,
    /// Live handles and the `kind:id` they were created for.
    pub live: BTreeMap<u64, String>,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    /// Release count per handle.
    pub destroyed: BTreeMap<u64, u32>,
    pub visibility: BTreeMap<u64, bool>,
    pub alerts: Vec<EncounterId>,
    pub statuses: Vec<ConnectionStatus>,
    pub countdowns: Vec<Vec<CountdownLabel>>,
}

impl RecordingSurface {
    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn assert_released_once(&self) {
        assert!(
            self.destroyed.values().all(|count| *count == 1),
            "every destroyed handle must be released exactly once: {:?}",
            self.destroyed
        );
        assert!(
            self.destroyed.keys().all(|handle| !self.live.contains_key(handle)),
            "a destroyed handle is still live"
        );
    }

    fn create(&mut self, label: String) -> Visual {
        self.next_handle = self.next_handle.saturating_add(1);
        self.live.insert(self.next_handle, label.clone());
        self.created.push(label);
        Visual(self.next_handle)
    }

    fn update(&mut self, handle: &Visual, label: String) {
        assert!(self.live.contains_key(&handle.0), "update on a released handle");
        self.updated.push(label);
    }

    fn destroy(&mut self, handle: Visual) {
        self.live.remove(&handle.0);
        let count = self.destroyed.entry(handle.0).or_insert(0);
        *count = count.saturating_add(1);
    }
}

impl VisualSurface<Sighting> for RecordingSurface {
    type Handle = Visual;

    fn create_visual(&mut self, entity: &Sighting) -> Visual {
        self.create(format!("sighting:{}", entity.id))
    }

    fn update_visual(&mut self, handle: &mut Visual, entity: &Sighting) {
        self.update(handle, format!("sighting:{}", entity.id));
    }

    fn destroy_visual(&mut self, handle: Visual) {
        self.destroy(handle);
    }
}

impl VisualSurface<TerritoryMarker> for RecordingSurface {
    type Handle = Visual;

    fn create_visual(&mut self, entity: &TerritoryMarker) -> Visual {
        self.create(format!("territory:{}", entity.id))
    }

    fn update_visual(&mut self, handle: &mut Visual, entity: &TerritoryMarker) {
        self.update(handle, format!("territory:{}", entity.id));
    }

    fn destroy_visual(&mut self, handle: Visual) {
        self.destroy(handle);
    }
}

impl VisualSurface<CoverageZone> for RecordingSurface {
    type Handle = Visual;

    fn create_visual(&mut self, entity: &CoverageZone) -> Visual {
        self.create(format!("coverage:{}", entity.key))
    }

    fn update_visual(&mut self, handle: &mut Visual, entity: &CoverageZone) {
        self.update(handle, format!("coverage:{}", entity.key));
    }

    fn destroy_visual(&mut self, handle: Visual) {
        self.destroy(handle);
    }

    fn set_visual_visibility(&mut self, handle: &mut Visual, visible: bool) {
        self.visibility.insert(handle.0, visible);
    }
}

impl AlertSink for RecordingSurface {
    fn fire_alert(&mut self, sighting: &Sighting) {
        self.alerts.push(sighting.id.clone());
    }
}

impl StatusSurface for RecordingSurface {
    fn show_status(&mut self, status: &ConnectionStatus) {
        self.statuses.push(status.clone());
    }

    fn show_countdowns(&mut self, labels: &[CountdownLabel]) {
        self.countdowns.push(labels.to_vec());
    }
}
