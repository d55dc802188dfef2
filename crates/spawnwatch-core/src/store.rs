//! Keyed working set of visible entities of one kind.
//!
//! An [`EntityStore`] maps each entity id to the entity and the handle of
//! its on-screen visual. The store is the only owner of those handles:
//!
//! - at most one entry per id;
//! - every entry holds exactly one live handle;
//! - removing an entry hands its handle back to the surface for release
//!   before the entry is dropped.
//!
//! The surface is passed into each mutating call rather than held by the
//! store, so one surface can back the stores of every kind.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use spawnwatch_types::{
    CoverageZone, EncounterId, EntityKind, Sighting, TerritoryId, TerritoryMarker, ZoneKey,
};

use crate::surface::VisualSurface;

/// An entity that can live in an [`EntityStore`].
pub trait Entity: Clone + PartialEq {
    /// Identifier, unique within the kind.
    type Id: Ord + Clone + fmt::Debug + fmt::Display;

    /// Which kind this is.
    const KIND: EntityKind;

    /// The entity's identifier.
    fn id(&self) -> Self::Id;

    /// Combine the stored entity with a fresh report of the same id.
    ///
    /// The default takes the report as-is.
    #[must_use]
    fn updated_with(&self, incoming: Self) -> Self {
        incoming
    }

    /// Whether moving from `previous` to `self` needs a different visual
    /// rather than an in-place update.
    fn needs_new_visual(&self, previous: &Self) -> bool {
        let _ = previous;
        false
    }
}

impl Entity for Sighting {
    type Id = EncounterId;
    const KIND: EntityKind = EntityKind::Sighting;

    fn id(&self) -> EncounterId {
        self.id.clone()
    }

    /// A sighting never moves and never changes species; only its expiry
    /// and display name are taken from the new report.
    fn updated_with(&self, incoming: Self) -> Self {
        Self {
            id: self.id.clone(),
            species: self.species,
            name: incoming.name.or_else(|| self.name.clone()),
            position: self.position,
            expires_at: incoming.expires_at,
        }
    }
}

impl Entity for TerritoryMarker {
    type Id = TerritoryId;
    const KIND: EntityKind = EntityKind::Territory;

    fn id(&self) -> TerritoryId {
        self.id.clone()
    }

    /// Faction decides the icon, so a change of hands replaces the marker.
    fn needs_new_visual(&self, previous: &Self) -> bool {
        self.faction != previous.faction
    }
}

impl Entity for CoverageZone {
    type Id = ZoneKey;
    const KIND: EntityKind = EntityKind::Coverage;

    fn id(&self) -> ZoneKey {
        self.key
    }
}

/// What an [`EntityStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The id was new; a visual was created.
    Created,
    /// The id existed and a mutable field changed; the visual was refreshed.
    Updated,
    /// The id existed with identical data; nothing happened.
    Unchanged,
}

#[derive(Debug)]
struct Slot<E, H> {
    entity: E,
    handle: H,
}

/// Keyed set of live entities of one kind, each owning its visual handle.
#[derive(Debug)]
pub struct EntityStore<E: Entity, H> {
    slots: BTreeMap<E::Id, Slot<E, H>>,
}

impl<E: Entity, H> Default for EntityStore<E, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity, H> EntityStore<E, H> {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    /// Insert a new entity or update the existing entry with the same id.
    ///
    /// A new id gets a fresh visual. An existing id whose merged data
    /// differs is updated in place, unless [`Entity::needs_new_visual`]
    /// asks for a replacement, in which case the new visual is created
    /// before the old one is released. Identical data is a no-op.
    pub fn upsert<S>(&mut self, incoming: E, surface: &mut S) -> UpsertOutcome
    where
        S: VisualSurface<E, Handle = H>,
    {
        match self.slots.entry(incoming.id()) {
            btree_map::Entry::Vacant(vacant) => {
                let handle = surface.create_visual(&incoming);
                vacant.insert(Slot {
                    entity: incoming,
                    handle,
                });
                UpsertOutcome::Created
            }
            btree_map::Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let next = slot.entity.updated_with(incoming);
                if next == slot.entity {
                    return UpsertOutcome::Unchanged;
                }

                if next.needs_new_visual(&slot.entity) {
                    let fresh = surface.create_visual(&next);
                    let stale = std::mem::replace(&mut slot.handle, fresh);
                    surface.destroy_visual(stale);
                } else {
                    surface.update_visual(&mut slot.handle, &next);
                }
                slot.entity = next;
                UpsertOutcome::Updated
            }
        }
    }

    /// Remove an entry, releasing its visual. Returns whether it existed.
    pub fn remove<S>(&mut self, id: &E::Id, surface: &mut S) -> bool
    where
        S: VisualSurface<E, Handle = H>,
    {
        match self.slots.remove(id) {
            Some(slot) => {
                surface.destroy_visual(slot.handle);
                true
            }
            None => false,
        }
    }

    /// Remove every entry for which `keep` returns false.
    ///
    /// Returns the ids that were removed, in id order.
    pub fn sweep<S>(&mut self, mut keep: impl FnMut(&E) -> bool, surface: &mut S) -> Vec<E::Id>
    where
        S: VisualSurface<E, Handle = H>,
    {
        let doomed: Vec<E::Id> = self
            .slots
            .iter()
            .filter(|(_, slot)| !keep(&slot.entity))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            self.remove(id, surface);
        }
        doomed
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: VisualSurface<E, Handle = H>,
    {
        let slots = std::mem::take(&mut self.slots);
        let count = slots.len();
        for slot in slots.into_values() {
            surface.destroy_visual(slot.handle);
        }
        count
    }

    /// Show or hide one entry's visual. Returns whether it existed.
    pub fn set_visibility_of<S>(&mut self, id: &E::Id, visible: bool, surface: &mut S) -> bool
    where
        S: VisualSurface<E, Handle = H>,
    {
        match self.slots.get_mut(id) {
            Some(slot) => {
                surface.set_visual_visibility(&mut slot.handle, visible);
                true
            }
            None => false,
        }
    }

    /// Show or hide every visual in the store.
    pub fn set_visibility<S>(&mut self, visible: bool, surface: &mut S)
    where
        S: VisualSurface<E, Handle = H>,
    {
        for slot in self.slots.values_mut() {
            surface.set_visual_visibility(&mut slot.handle, visible);
        }
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.slots.get(id).map(|slot| &slot.entity)
    }

    /// Whether an entry with this id exists.
    pub fn contains(&self, id: &E::Id) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.slots.values().map(|slot| &slot.entity)
    }

    /// Copy of every live entity, in id order.
    pub fn snapshot(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spawnwatch_types::{Faction, Position, SpeciesId};

    use super::*;
    use crate::test_support::{RecordingSurface, in_seconds, sighting, territory};

    type Sightings = EntityStore<Sighting, crate::test_support::Visual>;
    type Territories = EntityStore<TerritoryMarker, crate::test_support::Visual>;

    #[test]
    fn upsert_creates_then_updates_then_noops() {
        let mut surface = RecordingSurface::default();
        let mut store = Sightings::new();

        let first = sighting("a1", 4, in_seconds(60));
        assert_eq!(store.upsert(first.clone(), &mut surface), UpsertOutcome::Created);
        assert_eq!(store.upsert(first, &mut surface), UpsertOutcome::Unchanged);

        let extended = sighting("a1", 4, in_seconds(120));
        assert_eq!(store.upsert(extended, &mut surface), UpsertOutcome::Updated);

        assert_eq!(store.len(), 1);
        assert_eq!(surface.created.len(), 1);
        assert_eq!(surface.updated.len(), 1);
        assert!(surface.destroyed.is_empty());
    }

    #[test]
    fn sighting_update_keeps_position_and_species() {
        let mut surface = RecordingSurface::default();
        let mut store = Sightings::new();
        store.upsert(sighting("a1", 4, in_seconds(60)), &mut surface);

        let mut moved = sighting("a1", 7, in_seconds(90));
        moved.position = Position::new(-1.0, -1.0);
        store.upsert(moved, &mut surface);

        let stored = store.get(&EncounterId::new("a1")).unwrap();
        assert_eq!(stored.species, SpeciesId(4));
        assert_eq!(stored.position, Position::new(10.0, 20.0));
        assert_eq!(stored.expires_at, in_seconds(90));
    }

    #[test]
    fn faction_change_replaces_the_visual() {
        let mut surface = RecordingSurface::default();
        let mut store = Territories::new();
        store.upsert(territory("g1", Faction::Mystic, 100), &mut surface);

        assert_eq!(
            store.upsert(territory("g1", Faction::Mystic, 250), &mut surface),
            UpsertOutcome::Updated
        );
        assert_eq!(surface.created.len(), 1);
        assert_eq!(surface.updated.len(), 1);

        assert_eq!(
            store.upsert(territory("g1", Faction::Valor, 250), &mut surface),
            UpsertOutcome::Updated
        );
        assert_eq!(surface.created.len(), 2);
        assert_eq!(surface.destroyed.len(), 1);
        assert_eq!(surface.live_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut surface = RecordingSurface::default();
        let mut store = Sightings::new();
        store.upsert(sighting("a1", 4, in_seconds(60)), &mut surface);
        let id = EncounterId::new("a1");

        assert!(store.remove(&id, &mut surface));
        assert!(!store.remove(&id, &mut surface));
        assert!(store.is_empty());
        assert_eq!(surface.destroyed.len(), 1);
        surface.assert_released_once();
    }

    #[test]
    fn sweep_keeps_exactly_the_valid_entries() {
        let mut surface = RecordingSurface::default();
        let mut store = Sightings::new();
        for (id, species) in [("a", 1), ("b", 2), ("c", 3), ("d", 2)] {
            store.upsert(sighting(id, species, in_seconds(60)), &mut surface);
        }

        let removed = store.sweep(|s| s.species != SpeciesId(2), &mut surface);

        assert_eq!(removed, vec![EncounterId::new("b"), EncounterId::new("d")]);
        assert!(store.iter().all(|s| s.species != SpeciesId(2)));
        assert_eq!(store.len(), 2);
        assert_eq!(surface.live_count(), 2);
        surface.assert_released_once();
    }

    #[test]
    fn clear_releases_everything() {
        let mut surface = RecordingSurface::default();
        let mut store = Sightings::new();
        store.upsert(sighting("a", 1, in_seconds(60)), &mut surface);
        store.upsert(sighting("b", 1, in_seconds(60)), &mut surface);

        assert_eq!(store.clear(&mut surface), 2);
        assert!(store.is_empty());
        assert_eq!(surface.live_count(), 0);
        surface.assert_released_once();
    }
}
