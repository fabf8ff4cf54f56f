use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hotspot::Forces;
use crate::config::ResourceLimits;

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResourceKind {
    Money,
    Crew,
    Weapons,
    Vehicles,
    Respect,
    Influence,
    Heat,
}

string_enum!(ResourceKind {
    Money => "money",
    Crew => "crew",
    Weapons => "weapons",
    Vehicles => "vehicles",
    Respect => "respect",
    Influence => "influence",
    Heat => "heat",
});

impl ResourceKind {
    /// Kinds that are bought and sold on the market and committed to actions.
    pub const TRADABLE: [ResourceKind; 3] =
        [ResourceKind::Crew, ResourceKind::Weapons, ResourceKind::Vehicles];

    pub fn is_tradable(self) -> bool {
        Self::TRADABLE.contains(&self)
    }
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Rank label derived from `respect + influence`. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Title {
    Associate,
    Soldier,
    Capo,
    Underboss,
    Consigliere,
    Boss,
    Godfather,
}

string_enum!(Title {
    Associate => "Associate",
    Soldier => "Soldier",
    Capo => "Capo",
    Underboss => "Underboss",
    Consigliere => "Consigliere",
    Boss => "Boss",
    Godfather => "Godfather",
});

impl Title {
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 150 => Title::Godfather,
            s if s >= 100 => Title::Boss,
            s if s >= 80 => Title::Consigliere,
            s if s >= 60 => Title::Underboss,
            s if s >= 40 => Title::Capo,
            s if s >= 20 => Title::Soldier,
            _ => Title::Associate,
        }
    }

    /// 1 for Associate through 7 for Godfather.
    pub fn rank(self) -> u8 {
        self as u8 + 1
    }

    pub fn meets(self, minimum: Title) -> bool {
        self.rank() >= minimum.rank()
    }
}

// ---------------------------------------------------------------------------
// Deltas
// ---------------------------------------------------------------------------

/// A signed change per resource kind. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deltas(BTreeMap<ResourceKind, i64>);

impl Deltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Deltas::add`].
    pub fn with(mut self, kind: ResourceKind, amount: i64) -> Self {
        self.add(kind, amount);
        self
    }

    pub fn add(&mut self, kind: ResourceKind, amount: i64) {
        let total = self.get(kind) + amount;
        if total == 0 {
            self.0.remove(&kind);
        } else {
            self.0.insert(kind, total);
        }
    }

    pub fn get(&self, kind: ResourceKind) -> i64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, i64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// The compensating delta set: every entry with its sign flipped.
    pub fn negated(&self) -> Self {
        Self(self.0.iter().map(|(k, v)| (*k, -v)).collect())
    }

    /// Debit of committed forces (all entries non-positive).
    pub fn debit(forces: &Forces) -> Self {
        Self::new()
            .with(ResourceKind::Crew, -forces.crew)
            .with(ResourceKind::Weapons, -forces.weapons)
            .with(ResourceKind::Vehicles, -forces.vehicles)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub money: i64,
    pub crew: i64,
    pub weapons: i64,
    pub vehicles: i64,
    pub respect: i64,
    pub influence: i64,
    pub heat: i64,
    pub max_crew: i64,
    pub max_weapons: i64,
    pub max_vehicles: i64,
    pub title: Title,
    pub current_region_id: Option<Uuid>,
    pub last_active: Option<DateTime<Utc>>,
    pub last_travel_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Player {
    /// A freshly registered player with the configured starting resources.
    pub fn starting(name: &str, limits: &ResourceLimits, now: DateTime<Utc>) -> Self {
        let mut player = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            money: limits.initial_money,
            crew: limits.initial_crew,
            weapons: limits.initial_weapons,
            vehicles: limits.initial_vehicles,
            respect: limits.initial_respect,
            influence: limits.initial_influence,
            heat: limits.initial_heat,
            max_crew: limits.max_crew,
            max_weapons: limits.max_weapons,
            max_vehicles: limits.max_vehicles,
            title: Title::Associate,
            current_region_id: None,
            last_active: None,
            last_travel_time: None,
            created_at: now,
        };
        player.title = player.derived_title();
        player
    }

    pub fn amount(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Money => self.money,
            ResourceKind::Crew => self.crew,
            ResourceKind::Weapons => self.weapons,
            ResourceKind::Vehicles => self.vehicles,
            ResourceKind::Respect => self.respect,
            ResourceKind::Influence => self.influence,
            ResourceKind::Heat => self.heat,
        }
    }

    fn amount_mut(&mut self, kind: ResourceKind) -> &mut i64 {
        match kind {
            ResourceKind::Money => &mut self.money,
            ResourceKind::Crew => &mut self.crew,
            ResourceKind::Weapons => &mut self.weapons,
            ResourceKind::Vehicles => &mut self.vehicles,
            ResourceKind::Respect => &mut self.respect,
            ResourceKind::Influence => &mut self.influence,
            ResourceKind::Heat => &mut self.heat,
        }
    }

    /// Capacity limit for crew/weapons/vehicles; `None` for uncapped kinds.
    pub fn capacity(&self, kind: ResourceKind) -> Option<i64> {
        match kind {
            ResourceKind::Crew => Some(self.max_crew),
            ResourceKind::Weapons => Some(self.max_weapons),
            ResourceKind::Vehicles => Some(self.max_vehicles),
            _ => None,
        }
    }

    /// Whether the free (unallocated) forces cover `forces`.
    pub fn has_forces(&self, forces: &Forces) -> bool {
        self.crew >= forces.crew && self.weapons >= forces.weapons && self.vehicles >= forces.vehicles
    }

    /// `max(0, current + delta)` for every entry.
    pub fn apply_clamped(&mut self, deltas: &Deltas) {
        for (kind, delta) in deltas.iter() {
            let slot = self.amount_mut(kind);
            *slot = (*slot + delta).max(0);
        }
    }

    pub fn score(&self) -> i64 {
        self.respect + self.influence
    }

    pub fn derived_title(&self) -> Title {
        Title::from_score(self.score())
    }
}

/// A player with the territory aggregates clients display alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    #[serde(flatten)]
    pub player: Player,
    pub controlled_hotspots: i64,
    pub hourly_revenue: i64,
    pub pending_collections: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_bands_match_score_boundaries() {
        let cases = [
            (0, Title::Associate),
            (19, Title::Associate),
            (20, Title::Soldier),
            (39, Title::Soldier),
            (40, Title::Capo),
            (60, Title::Underboss),
            (80, Title::Consigliere),
            (99, Title::Consigliere),
            (100, Title::Boss),
            (149, Title::Boss),
            (150, Title::Godfather),
            (10_000, Title::Godfather),
        ];
        for (score, expected) in cases {
            assert_eq!(Title::from_score(score), expected, "score {score}");
        }
    }

    #[test]
    fn title_rank_is_ordered() {
        assert_eq!(Title::Associate.rank(), 1);
        assert_eq!(Title::Godfather.rank(), 7);
        assert!(Title::Boss.meets(Title::Capo));
        assert!(!Title::Soldier.meets(Title::Capo));
        assert!(Title::Capo.meets(Title::Capo));
    }

    #[test]
    fn title_parses_from_config_strings() {
        assert_eq!("Underboss".parse::<Title>(), Ok(Title::Underboss));
        assert!("Don".parse::<Title>().is_err());
    }

    #[test]
    fn deltas_drop_zero_entries() {
        let mut d = Deltas::new().with(ResourceKind::Money, 100);
        d.add(ResourceKind::Money, -100);
        assert!(d.is_empty());
        d.add(ResourceKind::Heat, 0);
        assert!(d.is_empty());
    }

    #[test]
    fn negated_deltas_restore_balance() {
        let now = Utc::now();
        let mut p = Player::starting("Vito", &ResourceLimits::default(), now);
        let before = p.clone();
        let d = Deltas::new()
            .with(ResourceKind::Money, 250)
            .with(ResourceKind::Crew, -1);
        p.apply_clamped(&d);
        p.apply_clamped(&d.negated());
        assert_eq!(p, before);
    }

    #[test]
    fn apply_clamps_at_zero() {
        let mut p = Player::starting("Vito", &ResourceLimits::default(), Utc::now());
        p.heat = 3;
        p.apply_clamped(&Deltas::new().with(ResourceKind::Heat, -10));
        assert_eq!(p.heat, 0);
    }

    #[test]
    fn deltas_serialize_with_string_keys() {
        let d = Deltas::new().with(ResourceKind::Weapons, 2);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"weapons":2}"#);
    }
}
