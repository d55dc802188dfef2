//! Time- and filter-based validity of sightings.
//!
//! Only sightings expire by time. Territory markers and coverage zones are
//! valid exactly while the server keeps reporting them; that membership
//! test lives in the reconciliation engine, not here.

use chrono::{DateTime, Utc};
use spawnwatch_types::Sighting;

use crate::preferences::FilterState;

/// Whether `expires_at` has been reached at `now`.
///
/// The boundary instant counts as expired, so a sighting is never shown
/// for a frame at the exact moment it disappears.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

/// Whether a sighting should be on the map at `now` under `filters`.
pub fn is_valid(sighting: &Sighting, now: DateTime<Utc>, filters: &FilterState) -> bool {
    !is_expired(sighting.expires_at, now) && !filters.is_excluded(sighting.species)
}
