//! User preferences: species filters, notify list, and display toggles.
//!
//! Preferences are persisted outside the core (a JSON file for the
//! command-line client, browser storage for a web front end) and injected
//! into the engine as a typed [`Preferences`] value. The core never writes
//! them.
//!
//! Loading is lenient. Each species list is parsed on its own, and a list
//! that fails to parse becomes empty: no exclusions, no notifications. A
//! broken preferences document never stops the map from running.
//!
//! A `notify_rarity` tier, given as a level (1 to 5) or a tier name, fills
//! the notify list with every species of that tier and rarer.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use spawnwatch_types::{EntityKind, SpeciesId};
use tracing::{debug, warn};

use crate::notify::{Rarity, apply_rarity_threshold};

/// Why a persisted species list could not be read.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    /// The list is not valid JSON.
    #[error("species list is not valid JSON: {source}")]
    Json {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },

    /// The value is not a list.
    #[error("species list must be an array")]
    NotAList,

    /// An element is not a species id.
    #[error("invalid species id {0}")]
    InvalidSpecies(String),
}

/// Species-level filters consumed by expiry and notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// Species never shown on the map.
    #[serde(default)]
    pub excluded: BTreeSet<SpeciesId>,
    /// Species that raise an alert when they appear.
    #[serde(default)]
    pub notify: BTreeSet<SpeciesId>,
}

impl FilterState {
    /// Whether `species` is hidden.
    pub fn is_excluded(&self, species: SpeciesId) -> bool {
        self.excluded.contains(&species)
    }
}

/// Which entity feeds are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedToggles {
    /// Show creature sightings.
    #[serde(default = "default_true")]
    pub sightings: bool,
    /// Show territory markers.
    #[serde(default = "default_true")]
    pub territories: bool,
    /// Show scan coverage.
    #[serde(default = "default_true")]
    pub coverage: bool,
}

impl Default for FeedToggles {
    fn default() -> Self {
        Self {
            sightings: true,
            territories: true,
            coverage: true,
        }
    }
}

impl FeedToggles {
    /// Whether the feed for `kind` is enabled.
    pub const fn is_enabled(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Sighting => self.sightings,
            EntityKind::Territory => self.territories,
            EntityKind::Coverage => self.coverage,
        }
    }
}

/// Everything the user controls about what the map shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Species filters.
    #[serde(flatten)]
    pub filters: FilterState,
    /// Whether coverage zones are drawn. Hidden zones stay in the store.
    #[serde(default = "default_true")]
    pub show_coverage: bool,
    /// Per-kind feed toggles.
    #[serde(default)]
    pub feeds: FeedToggles,
    /// Rarity tier the notify list was filled from, if any.
    #[serde(default)]
    pub notify_rarity: Option<Rarity>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            filters: FilterState::default(),
            show_coverage: true,
            feeds: FeedToggles::default(),
            notify_rarity: None,
        }
    }
}

impl Preferences {
    /// Parse a preferences document, falling back field by field.
    ///
    /// `excluded` and `notify` may be arrays or, as browser storage keeps
    /// them, strings holding a JSON array. Anything unreadable becomes its
    /// default.
    pub fn from_json_lossy(raw: &str) -> Self {
        let doc: Value = match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(_) => {
                warn!("preferences document is not an object, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(error = %e, "preferences document is not valid JSON, using defaults");
                return Self::default();
            }
        };

        let mut filters = FilterState {
            excluded: doc
                .get("excluded")
                .map_or_else(BTreeSet::new, |v| lenient_value("excluded", v)),
            notify: doc
                .get("notify")
                .map_or_else(BTreeSet::new, |v| lenient_value("notify", v)),
        };

        let notify_rarity = doc.get("notify_rarity").and_then(|v| {
            let tier = rarity_from_value(v);
            if tier.is_none() {
                warn!(value = %v, "unknown notify rarity, ignoring");
            }
            tier
        });
        if let Some(tier) = notify_rarity {
            apply_rarity_threshold(&mut filters.notify, tier);
        }

        let show_coverage = doc
            .get("show_coverage")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let feeds = doc
            .get("feeds")
            .map(|v| {
                FeedToggles::deserialize(v).unwrap_or_else(|e| {
                    warn!(error = %e, "invalid feed toggles, showing every feed");
                    FeedToggles::default()
                })
            })
            .unwrap_or_default();

        Self {
            filters,
            show_coverage,
            feeds,
            notify_rarity,
        }
    }

    /// Read preferences from a file.
    ///
    /// A missing file yields defaults. An unreadable or malformed file is
    /// logged and also yields defaults.
    pub fn load_lossy(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json_lossy(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no preferences file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read preferences, using defaults");
                Self::default()
            }
        }
    }
}

/// Parse a persisted species list: a JSON array of ids, as strings or numbers.
///
/// # Errors
///
/// Returns [`PreferencesError`] if the text is not a JSON array of species ids.
pub fn parse_species_list(raw: &str) -> Result<BTreeSet<SpeciesId>, PreferencesError> {
    let value: Value = serde_json::from_str(raw)?;
    species_from_value(&value)
}

fn species_from_value(value: &Value) -> Result<BTreeSet<SpeciesId>, PreferencesError> {
    match value {
        Value::Array(items) => items.iter().map(species_from_element).collect(),
        // Browser storage double-encodes: the list is a string of JSON.
        Value::String(inner) => parse_species_list(inner),
        _ => Err(PreferencesError::NotAList),
    }
}

fn species_from_element(item: &Value) -> Result<SpeciesId, PreferencesError> {
    match item {
        Value::String(text) => text
            .parse::<SpeciesId>()
            .map_err(|e| PreferencesError::InvalidSpecies(format!("{text:?} ({e})"))),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(SpeciesId)
            .ok_or_else(|| PreferencesError::InvalidSpecies(n.to_string())),
        other => Err(PreferencesError::InvalidSpecies(other.to_string())),
    }
}

fn lenient_value(name: &str, value: &Value) -> BTreeSet<SpeciesId> {
    species_from_value(value).unwrap_or_else(|e| {
        warn!(list = name, error = %e, "unreadable species list, treating as empty");
        BTreeSet::new()
    })
}

/// A rarity selector: a 1-based level or a snake_case tier name.
fn rarity_from_value(value: &Value) -> Option<Rarity> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Rarity::from_level),
        Value::String(_) => Rarity::deserialize(value).ok(),
        _ => None,
    }
}

const fn default_true() -> bool {
    true
}
