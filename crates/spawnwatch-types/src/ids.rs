//! Type-safe identifier wrappers for map entities.
//!
//! Every entity kind has its own identifier type so a territory id can never
//! be used to look up a sighting. Server-issued ids arrive as either JSON
//! strings or integers depending on the backend, so the wire layer
//! normalizes them to strings before they are wrapped here.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entities::Position;

/// Micro-degrees per degree, the resolution of a [`ZoneKey`].
const MICRO_DEGREES: f64 = 1_000_000.0;

/// Generates a newtype wrapper around a server-issued string id.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a server-issued identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Encounter id of a creature sighting, stable for the sighting's lifetime.
    EncounterId
}

define_id! {
    /// Identifier of a territory marker (gym).
    TerritoryId
}

/// National index of a creature species (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub u16);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u16> for SpeciesId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Derived key of a coverage zone: its centre rounded to micro-degrees.
///
/// Coverage zones carry no server id. Two reports whose centres round to
/// the same micro-degree pair are the same zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneKey {
    /// Latitude in micro-degrees.
    pub lat_e6: i64,
    /// Longitude in micro-degrees.
    pub lon_e6: i64,
}

impl ZoneKey {
    /// Derive the key for a zone centred at `position`.
    ///
    /// Coordinates are range-checked by the wire layer before a key is
    /// derived, so the rounded values always fit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_position(position: Position) -> Self {
        Self {
            lat_e6: (position.latitude * MICRO_DEGREES).round() as i64,
            lon_e6: (position.longitude * MICRO_DEGREES).round() as i64,
        }
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat_e6, self.lon_e6)
    }
}
