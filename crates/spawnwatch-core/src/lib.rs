//! Reconciliation engine, poll scheduler, and notification gate for the
//! spawnwatch live map.
//!
//! Every feed cycle the map server reports the full set of entities it
//! currently knows about. This crate turns those snapshots into the minimal
//! set of create/update/destroy calls on a rendering surface, expires
//! sightings on the wall clock, and raises an alert the first time an
//! interesting sighting appears.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `spawnwatch-config.yaml`.
//! - [`countdown`] -- Remaining-time text for sighting labels.
//! - [`expiry`] -- Time- and filter-based validity of sightings.
//! - [`label`] -- Info-window and alert text via `minijinja`.
//! - [`notify`] -- Arrival notification gate and rarity tiers.
//! - [`preferences`] -- User filters and display toggles.
//! - [`reconcile`] -- [`ReconciliationEngine`], snapshot to surface calls.
//! - [`scheduler`] -- [`PollScheduler`] timers and its control handle.
//! - [`store`] -- [`EntityStore`], the keyed working set of one kind.
//! - [`surface`] -- Traits the rendering side implements.
//!
//! [`ReconciliationEngine`]: reconcile::ReconciliationEngine
//! [`PollScheduler`]: scheduler::PollScheduler
//! [`EntityStore`]: store::EntityStore

pub mod config;
pub mod countdown;
pub mod expiry;
pub mod label;
pub mod notify;
pub mod preferences;
pub mod reconcile;
pub mod scheduler;
pub mod store;
pub mod surface;

#[cfg(test)]
mod test_support;
