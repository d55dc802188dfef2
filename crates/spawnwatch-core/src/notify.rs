//! Arrival notification gate and rarity-based notify-list selection.
//!
//! The gate is consulted once, when a sighting is first created. Updates
//! to a sighting that is already on the map never notify again.
//!
//! Users can also fill their notify list by rarity: picking a tier adds
//! every species of that tier and rarer, and removes the commoner ones.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use spawnwatch_types::{Sighting, SpeciesId};

/// Whether a newly created sighting should raise an alert.
pub fn should_notify(sighting: &Sighting, interest: &BTreeSet<SpeciesId>) -> bool {
    interest.contains(&sighting.species)
}

/// Rarity tiers, commonest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// Seen everywhere.
    Common,
    /// Seen often.
    Uncommon,
    /// Seen occasionally.
    Rare,
    /// Seen seldom.
    VeryRare,
    /// Seen almost never.
    UltraRare,
}

const COMMON: &[u16] = &[13, 16, 19, 41, 133];

const UNCOMMON: &[u16] = &[
    1, 7, 10, 17, 21, 23, 25, 29, 32, 35, 43, 46, 48, 58, 60, 69, 84, 92, 96, 98, 120, 127, 129,
    147,
];

const RARE: &[u16] = &[
    2, 4, 8, 11, 14, 15, 18, 20, 22, 27, 37, 39, 42, 47, 49, 50, 52, 54, 56, 61, 63, 66, 70, 72,
    74, 77, 79, 81, 86, 90, 93, 95, 97, 100, 102, 104, 107, 108, 109, 111, 114, 116, 118, 123, 124,
    125, 126, 128, 138, 140, 143,
];

const VERY_RARE: &[u16] = &[
    3, 5, 6, 9, 12, 24, 30, 31, 33, 34, 36, 44, 53, 55, 57, 59, 64, 67, 73, 75, 78, 80, 85, 88, 99,
    103, 105, 106, 110, 112, 113, 117, 119, 121, 122, 131, 134, 135, 137, 142, 148, 149,
];

const ULTRA_RARE: &[u16] = &[
    26, 28, 38, 40, 45, 51, 62, 65, 68, 71, 76, 82, 83, 87, 89, 91, 94, 101, 115, 130, 132, 136,
    139, 141, 144, 145, 146, 150, 151,
];

impl Rarity {
    /// Every tier, commonest first.
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::VeryRare,
        Self::UltraRare,
    ];

    /// Species belonging to this tier.
    pub const fn species(self) -> &'static [u16] {
        match self {
            Self::Common => COMMON,
            Self::Uncommon => UNCOMMON,
            Self::Rare => RARE,
            Self::VeryRare => VERY_RARE,
            Self::UltraRare => ULTRA_RARE,
        }
    }

    /// Tier of a species, if it is ranked at all.
    pub fn of(species: SpeciesId) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.species().contains(&species.0))
    }

    /// Tier from its 1-based selector level (1 = common, 5 = ultra rare).
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Common),
            2 => Some(Self::Uncommon),
            3 => Some(Self::Rare),
            4 => Some(Self::VeryRare),
            5 => Some(Self::UltraRare),
            _ => None,
        }
    }
}

/// Point the notify list at `threshold` and rarer.
///
/// Ranked species below the threshold are removed, ranked species at or
/// above it are added. Unranked species already in the list are left alone.
pub fn apply_rarity_threshold(interest: &mut BTreeSet<SpeciesId>, threshold: Rarity) {
    for tier in Rarity::ALL {
        let species = tier.species().iter().copied().map(SpeciesId);
        if tier < threshold {
            for id in species {
                interest.remove(&id);
            }
        } else {
            interest.extend(species);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{in_seconds, sighting};

    #[test]
    fn notifies_only_for_interesting_species() {
        let interest: BTreeSet<SpeciesId> = [SpeciesId(4)].into_iter().collect();
        assert!(should_notify(&sighting("a1", 4, in_seconds(60)), &interest));
        assert!(!should_notify(&sighting("a2", 5, in_seconds(60)), &interest));
    }

    #[test]
    fn tiers_do_not_overlap() {
        for species in 1..=151_u16 {
            let tiers = Rarity::ALL
                .iter()
                .filter(|t| t.species().contains(&species))
                .count();
            assert_eq!(tiers, 1, "species {species} must be in exactly one tier");
        }
    }

    #[test]
    fn threshold_swaps_common_for_rare() {
        let mut interest: BTreeSet<SpeciesId> = [SpeciesId(16), SpeciesId(500)].into_iter().collect();
        apply_rarity_threshold(&mut interest, Rarity::VeryRare);

        assert!(!interest.contains(&SpeciesId(16)));
        assert!(!interest.contains(&SpeciesId(25)));
        assert!(interest.contains(&SpeciesId(131)));
        assert!(interest.contains(&SpeciesId(151)));
        assert!(interest.contains(&SpeciesId(500)), "unranked species are kept");
        assert_eq!(
            interest.len(),
            VERY_RARE.len() + ULTRA_RARE.len() + 1
        );
    }

    #[test]
    fn tier_lookup() {
        assert_eq!(Rarity::of(SpeciesId(133)), Some(Rarity::Common));
        assert_eq!(Rarity::of(SpeciesId(150)), Some(Rarity::UltraRare));
        assert_eq!(Rarity::of(SpeciesId(0)), None);
        assert_eq!(Rarity::from_level(3), Some(Rarity::Rare));
        assert_eq!(Rarity::from_level(6), None);
    }
}
