//! Shared type definitions for the spawnwatch live map.
//!
//! This crate holds the data that flows from the map server into the
//! reconciliation engine: typed identifiers, the three entity kinds, and the
//! lenient parser for the map-data payload.
//!
//! # Modules
//!
//! - [`ids`] -- Per-kind identifier newtypes and the derived coverage key
//! - [`entities`] -- Sightings, territory markers, coverage zones
//! - [`snapshot`] -- Wire records and per-record tolerant parsing

pub mod entities;
pub mod ids;
pub mod snapshot;

pub use entities::{CoverageZone, EntityKind, Faction, Position, Sighting, TerritoryMarker};
pub use ids::{EncounterId, SpeciesId, TerritoryId, ZoneKey};
pub use snapshot::{RecordError, Rejection, Snapshot, SnapshotError};
