//! Entity types rendered on the live map.
//!
//! Three kinds of entity are tracked:
//!
//! - [`Sighting`] -- a creature appearance with an absolute expiry time.
//! - [`TerritoryMarker`] -- a territory (gym) held by a faction. No expiry;
//!   valid only while the server keeps reporting it.
//! - [`CoverageZone`] -- a location the scanner has covered. No expiry and
//!   no server id; keyed by its rounded centre.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EncounterId, SpeciesId, TerritoryId, ZoneKey};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
}

impl Position {
    /// Create a position from raw coordinates.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and within their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// The kinds of entity the map tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Time-limited creature sightings.
    Sighting,
    /// Presence-based territory markers.
    Territory,
    /// Presence-based scan-coverage zones.
    Coverage,
}

impl EntityKind {
    /// Every kind, in reconciliation order.
    pub const ALL: [Self; 3] = [Self::Sighting, Self::Territory, Self::Coverage];

    /// Stable lowercase name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sighting => "sighting",
            Self::Territory => "territory",
            Self::Coverage => "coverage",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A creature appearance that disappears at a fixed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    /// Encounter id assigned by the server.
    pub id: EncounterId,
    /// Species of the creature.
    pub species: SpeciesId,
    /// Display name, when the server supplies one.
    pub name: Option<String>,
    /// Where the creature was seen.
    pub position: Position,
    /// When the creature disappears.
    pub expires_at: DateTime<Utc>,
}

impl Sighting {
    /// Display name, falling back to `#<species>` when the server sent none.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("#{}", self.species))
    }
}

/// Faction controlling a territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Nobody holds the territory.
    Uncontested,
    /// Team Mystic (blue).
    Mystic,
    /// Team Valor (red).
    Valor,
    /// Team Instinct (yellow).
    Instinct,
}

impl Faction {
    /// Map the server's numeric team id to a faction.
    pub const fn from_team_id(team_id: u8) -> Option<Self> {
        match team_id {
            0 => Some(Self::Uncontested),
            1 => Some(Self::Mystic),
            2 => Some(Self::Valor),
            3 => Some(Self::Instinct),
            _ => None,
        }
    }

    /// Human-readable faction name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uncontested => "Uncontested",
            Self::Mystic => "Mystic",
            Self::Valor => "Valor",
            Self::Instinct => "Instinct",
        }
    }
}

/// A territory held by a faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerritoryMarker {
    /// Territory id assigned by the server.
    pub id: TerritoryId,
    /// Location of the territory.
    pub position: Position,
    /// Faction currently in control.
    pub faction: Faction,
    /// Prestige points held by the controlling faction.
    pub strength: u32,
}

/// An area the scanner has covered recently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageZone {
    /// Key derived from the rounded centre.
    pub key: ZoneKey,
    /// Centre of the zone.
    pub position: Position,
    /// Radius of the zone in metres.
    pub radius_m: f64,
}

impl CoverageZone {
    /// Build a zone, deriving its key from the centre.
    pub fn new(position: Position, radius_m: f64) -> Self {
        Self {
            key: ZoneKey::from_position(position),
            position,
            radius_m,
        }
    }
}
