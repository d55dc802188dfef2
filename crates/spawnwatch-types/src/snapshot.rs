//! Wire format of the map-data feed and its conversion into typed entities.
//!
//! The server answers each poll with a JSON object holding one list per
//! entity kind plus free-form health metadata:
//!
//! ```text
//! {
//!   "pokemons": [{"encounter_id", "pokemon_id", "pokemon_name"?, "latitude", "longitude", "disappear_time"}],
//!   "gyms":     [{"gym_id", "latitude", "longitude", "team_id", "gym_points"?}],
//!   "scanned":  [{"latitude", "longitude", "radius"}],
//!   "health":   { ... }
//! }
//! ```
//!
//! Parsing is lenient per record: a malformed record is dropped and noted
//! in [`Snapshot::rejections`], the rest of the payload is still used. A
//! list that is missing from the payload parses as `None` (the server did
//! not report on that kind), which is different from an empty list.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::entities::{CoverageZone, EntityKind, Faction, Position, Sighting, TerritoryMarker};
use crate::ids::{EncounterId, SpeciesId, TerritoryId};

/// JSON key of the sighting list.
pub const SIGHTINGS_KEY: &str = "pokemons";
/// JSON key of the territory list.
pub const TERRITORIES_KEY: &str = "gyms";
/// JSON key of the coverage list.
pub const COVERAGE_KEY: &str = "scanned";
/// JSON key of the health metadata.
pub const HEALTH_KEY: &str = "health";

/// Errors that make a whole payload unusable.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The body is not valid JSON.
    #[error("snapshot is not valid JSON: {source}")]
    Json {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The body is JSON but not an object.
    #[error("snapshot must be a JSON object, got {found}")]
    NotAnObject {
        /// The JSON type that was received instead.
        found: &'static str,
    },
}

/// Why a single record was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// A field is missing or has the wrong type.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Latitude or longitude is out of range or not finite.
    #[error("coordinates out of range")]
    InvalidCoordinates,

    /// The identifier is empty.
    #[error("empty identifier")]
    EmptyId,

    /// The expiry timestamp is outside the representable range.
    #[error("disappear_time {0} is not a valid timestamp")]
    InvalidExpiry(i64),

    /// The team id does not name a known faction.
    #[error("unknown team id {0}")]
    UnknownFaction(u8),

    /// The coverage radius is not a positive finite number.
    #[error("invalid radius")]
    InvalidRadius,

    /// The list itself was not a JSON array.
    #[error("expected a list of records")]
    NotAList,
}

/// A record that was dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Kind of the list the record came from.
    pub kind: EntityKind,
    /// Index of the record within its list.
    pub index: usize,
    /// Why it was dropped.
    pub reason: RecordError,
}

/// One poll's worth of typed entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Reported sightings, or `None` if the payload had no sighting list.
    pub sightings: Option<Vec<Sighting>>,
    /// Reported territories, or `None` if the payload had no territory list.
    pub territories: Option<Vec<TerritoryMarker>>,
    /// Reported coverage zones, or `None` if the payload had no coverage list.
    pub coverage: Option<Vec<CoverageZone>>,
    /// Health metadata passed through to the status indicator.
    pub health: Option<Value>,
    /// Records dropped while parsing.
    pub rejections: Vec<Rejection>,
}

impl Snapshot {
    /// Parse a raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the body is not a JSON object. Bad
    /// individual records never fail the parse.
    pub fn from_slice(body: &[u8]) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_json(&value)
    }

    /// Parse an already-decoded JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotAnObject`] if `body` is not an object.
    pub fn from_json(body: &Value) -> Result<Self, SnapshotError> {
        let Value::Object(map) = body else {
            return Err(SnapshotError::NotAnObject {
                found: json_type_name(body),
            });
        };

        let mut rejections = Vec::new();

        let sightings = map.get(SIGHTINGS_KEY).and_then(|list| {
            parse_list(list, EntityKind::Sighting, &mut rejections, |item| {
                SightingRecord::deserialize(item)
                    .map_err(|e| RecordError::Malformed(e.to_string()))
                    .and_then(Sighting::try_from)
            })
        });

        let territories = map.get(TERRITORIES_KEY).and_then(|list| {
            parse_list(list, EntityKind::Territory, &mut rejections, |item| {
                TerritoryRecord::deserialize(item)
                    .map_err(|e| RecordError::Malformed(e.to_string()))
                    .and_then(TerritoryMarker::try_from)
            })
        });

        let coverage = map.get(COVERAGE_KEY).and_then(|list| {
            parse_list(list, EntityKind::Coverage, &mut rejections, |item| {
                CoverageRecord::deserialize(item)
                    .map_err(|e| RecordError::Malformed(e.to_string()))
                    .and_then(CoverageZone::try_from)
            })
        });

        Ok(Self {
            sightings,
            territories,
            coverage,
            health: map.get(HEALTH_KEY).cloned(),
            rejections,
        })
    }

    /// Number of records dropped for one kind.
    pub fn rejected_count(&self, kind: EntityKind) -> usize {
        self.rejections.iter().filter(|r| r.kind == kind).count()
    }
}

/// Parse every element of a list, collecting the ones that convert.
///
/// A value that is not an array is treated as if the kind had not been
/// reported at all, and noted as one [`RecordError::NotAList`] rejection.
fn parse_list<T>(
    list: &Value,
    kind: EntityKind,
    rejections: &mut Vec<Rejection>,
    mut convert: impl FnMut(&Value) -> Result<T, RecordError>,
) -> Option<Vec<T>> {
    let Value::Array(items) = list else {
        rejections.push(Rejection {
            kind,
            index: 0,
            reason: RecordError::NotAList,
        });
        return None;
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match convert(item) {
            Ok(entity) => parsed.push(entity),
            Err(reason) => rejections.push(Rejection {
                kind,
                index,
                reason,
            }),
        }
    }
    Some(parsed)
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Identifier as sent by the server: older backends send integers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

impl WireId {
    fn into_string(self) -> Result<String, RecordError> {
        let id = match self {
            Self::Text(text) => text.trim().to_owned(),
            Self::Number(n) => n.to_string(),
        };
        if id.is_empty() {
            Err(RecordError::EmptyId)
        } else {
            Ok(id)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SightingRecord {
    encounter_id: WireId,
    pokemon_id: u16,
    #[serde(default)]
    pokemon_name: Option<String>,
    latitude: f64,
    longitude: f64,
    /// Epoch milliseconds.
    disappear_time: i64,
}

#[derive(Debug, Deserialize)]
struct TerritoryRecord {
    gym_id: WireId,
    latitude: f64,
    longitude: f64,
    team_id: u8,
    #[serde(default)]
    gym_points: u32,
}

#[derive(Debug, Deserialize)]
struct CoverageRecord {
    latitude: f64,
    longitude: f64,
    radius: f64,
}

fn checked_position(latitude: f64, longitude: f64) -> Result<Position, RecordError> {
    let position = Position::new(latitude, longitude);
    if position.is_valid() {
        Ok(position)
    } else {
        Err(RecordError::InvalidCoordinates)
    }
}

impl TryFrom<SightingRecord> for Sighting {
    type Error = RecordError;

    fn try_from(record: SightingRecord) -> Result<Self, Self::Error> {
        let position = checked_position(record.latitude, record.longitude)?;
        let expires_at: DateTime<Utc> = DateTime::from_timestamp_millis(record.disappear_time)
            .ok_or(RecordError::InvalidExpiry(record.disappear_time))?;
        Ok(Self {
            id: EncounterId::new(record.encounter_id.into_string()?),
            species: SpeciesId(record.pokemon_id),
            name: record.pokemon_name.filter(|n| !n.trim().is_empty()),
            position,
            expires_at,
        })
    }
}

impl TryFrom<TerritoryRecord> for TerritoryMarker {
    type Error = RecordError;

    fn try_from(record: TerritoryRecord) -> Result<Self, Self::Error> {
        let position = checked_position(record.latitude, record.longitude)?;
        let faction = Faction::from_team_id(record.team_id)
            .ok_or(RecordError::UnknownFaction(record.team_id))?;
        Ok(Self {
            id: TerritoryId::new(record.gym_id.into_string()?),
            position,
            faction,
            strength: record.gym_points,
        })
    }
}

impl TryFrom<CoverageRecord> for CoverageZone {
    type Error = RecordError;

    fn try_from(record: CoverageRecord) -> Result<Self, Self::Error> {
        let position = checked_position(record.latitude, record.longitude)?;
        if !record.radius.is_finite() || record.radius <= 0.0 {
            return Err(RecordError::InvalidRadius);
        }
        Ok(Self::new(position, record.radius))
    }
}
