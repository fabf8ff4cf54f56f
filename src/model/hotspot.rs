use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defense contributed by each unit of a committed or allocated force.
pub const CREW_STRENGTH: i64 = 10;
pub const WEAPON_STRENGTH: i64 = 15;
pub const VEHICLE_STRENGTH: i64 = 20;

// ---------------------------------------------------------------------------
// Forces
// ---------------------------------------------------------------------------

/// Crew, weapons and vehicles committed to an action or allocated to a hotspot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Forces {
    #[serde(default)]
    pub crew: i64,
    #[serde(default)]
    pub weapons: i64,
    #[serde(default)]
    pub vehicles: i64,
}

impl Forces {
    pub const fn new(crew: i64, weapons: i64, vehicles: i64) -> Self {
        Self {
            crew,
            weapons,
            vehicles,
        }
    }

    pub fn strength(&self) -> i64 {
        CREW_STRENGTH * self.crew + WEAPON_STRENGTH * self.weapons + VEHICLE_STRENGTH * self.vehicles
    }

    pub fn is_negative(&self) -> bool {
        self.crew < 0 || self.weapons < 0 || self.vehicles < 0
    }

    pub fn is_zero(&self) -> bool {
        self.crew == 0 && self.weapons == 0 && self.vehicles == 0
    }

    pub fn plus(&self, other: &Forces) -> Forces {
        Forces::new(
            self.crew + other.crew,
            self.weapons + other.weapons,
            self.vehicles + other.vehicles,
        )
    }
}

// ---------------------------------------------------------------------------
// Hotspot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub business_type: String,
    pub is_legal: bool,
    pub income: i64,
    pub controller_id: Option<Uuid>,
    pub allocated: Forces,
    /// Always `allocated.strength()`; kept in sync by every mutator.
    pub defense_strength: i64,
    pub pending_collection: i64,
    pub last_income_time: Option<DateTime<Utc>>,
    pub last_collection_time: Option<DateTime<Utc>>,
}

impl Hotspot {
    pub fn new(name: &str, city: &str, business_type: &str, is_legal: bool, income: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: city.to_string(),
            business_type: business_type.to_string(),
            is_legal,
            income,
            controller_id: None,
            allocated: Forces::default(),
            defense_strength: 0,
            pending_collection: 0,
            last_income_time: None,
            last_collection_time: None,
        }
    }

    pub fn is_controlled_by(&self, player_id: Uuid) -> bool {
        self.controller_id == Some(player_id)
    }

    pub fn recompute_defense(&mut self) {
        self.defense_strength = self.allocated.strength();
    }

    /// Replace controller and allocation (takeover semantics).
    pub fn seize(&mut self, player_id: Uuid, forces: Forces) {
        self.controller_id = Some(player_id);
        self.allocated = forces;
        self.recompute_defense();
    }

    /// Add to the current allocation (defend semantics).
    pub fn reinforce(&mut self, forces: Forces) {
        self.allocated = self.allocated.plus(&forces);
        self.recompute_defense();
    }

    /// Drop controller and allocation (illegal-hotspot reset).
    pub fn release(&mut self) {
        self.controller_id = None;
        self.allocated = Forces::default();
        self.recompute_defense();
    }
}

// ---------------------------------------------------------------------------
// Territory actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ActionKind {
    Extortion,
    Takeover,
    Collection,
    Defend,
}

string_enum!(ActionKind {
    Extortion => "extortion",
    Takeover => "takeover",
    Collection => "collection",
    Defend => "defend",
});

/// Everything an action roll produced. Gains and losses are non-negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    pub money_gained: i64,
    pub money_lost: i64,
    pub crew_gained: i64,
    pub crew_lost: i64,
    pub weapons_gained: i64,
    pub weapons_lost: i64,
    pub vehicles_gained: i64,
    pub vehicles_lost: i64,
    pub respect_gained: i64,
    pub respect_lost: i64,
    pub influence_gained: i64,
    pub heat_generated: i64,
    pub message: String,
}

/// Write-once record of one resolved territory action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerritoryAction {
    pub id: Uuid,
    pub kind: ActionKind,
    pub player_id: Uuid,
    pub hotspot_id: Uuid,
    pub resources: Forces,
    pub result: ActionResult,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of collecting one hotspot's pending income.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    pub hotspot_id: Uuid,
    pub hotspot_name: String,
    pub collected_amount: i64,
    pub message: String,
}

/// Outcome of collecting every controlled hotspot at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectAllResponse {
    pub collected_amount: i64,
    pub hotspots_count: i64,
    pub message: String,
}
