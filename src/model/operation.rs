use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hotspot::Forces;
use super::player::Title;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum OperationKind {
    Carjacking,
    GoodsSmuggling,
    DrugTrafficking,
    OfficialBribing,
    IntelligenceGathering,
    CrewRecruitment,
    Custom(String),
}

string_enum_open!(OperationKind, "operation kind", {
    Carjacking => "carjacking",
    GoodsSmuggling => "goods_smuggling",
    DrugTrafficking => "drug_trafficking",
    OfficialBribing => "official_bribing",
    IntelligenceGathering => "intelligence_gathering",
    CrewRecruitment => "crew_recruitment",
});

impl OperationKind {
    /// Kinds used when synthesizing placeholder operations.
    pub fn standard() -> [OperationKind; 6] {
        [
            OperationKind::Carjacking,
            OperationKind::GoodsSmuggling,
            OperationKind::DrugTrafficking,
            OperationKind::OfficialBribing,
            OperationKind::IntelligenceGathering,
            OperationKind::CrewRecruitment,
        ]
    }
}

/// Gate checked at start. Zero / `None` means no requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Requirements {
    pub min_influence: i64,
    pub max_heat: i64,
    pub min_title: Option<Title>,
}

/// Resources an operation asks for, and what a player commits to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationResources {
    pub crew: i64,
    pub weapons: i64,
    pub vehicles: i64,
    pub money: i64,
}

impl OperationResources {
    pub fn forces(&self) -> Forces {
        Forces::new(self.crew, self.weapons, self.vehicles)
    }

    pub fn is_negative(&self) -> bool {
        self.forces().is_negative() || self.money < 0
    }

    /// Each field halved, rounding down.
    pub fn halved(&self) -> Self {
        Self {
            crew: self.crew / 2,
            weapons: self.weapons / 2,
            vehicles: self.vehicles / 2,
            money: self.money / 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rewards {
    pub money: i64,
    pub crew: i64,
    pub weapons: i64,
    pub vehicles: i64,
    pub respect: i64,
    pub influence: i64,
    pub heat_reduction: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Risks {
    pub crew_loss: i64,
    pub weapons_loss: i64,
    pub vehicles_loss: i64,
    pub money_loss: i64,
    pub heat_increase: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub kind: OperationKind,
    pub is_special: bool,
    pub is_active: bool,
    pub requirements: Requirements,
    pub resources: OperationResources,
    pub rewards: Rewards,
    pub risks: Risks,
    pub duration_secs: i64,
    /// 0–100.
    pub success_rate: i64,
    pub available_until: DateTime<Utc>,
}

impl Operation {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.available_until > now
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

string_enum!(AttemptStatus {
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        self != AttemptStatus::InProgress
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
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
    pub influence_gained: i64,
    pub heat_generated: i64,
    pub heat_reduced: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationAttempt {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub player_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub resources: OperationResources,
    pub status: AttemptStatus,
    pub result: Option<OperationResult>,
    pub completion_time: Option<DateTime<Utc>>,
    /// Set once the ready-to-collect notice has been published.
    pub notified: bool,
}

impl OperationAttempt {
    pub fn start(
        operation_id: Uuid,
        player_id: Uuid,
        resources: OperationResources,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_id,
            player_id,
            start_time: now,
            resources,
            status: AttemptStatus::InProgress,
            result: None,
            completion_time: None,
            notified: false,
        }
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds()
    }
}

/// An operation as offered to one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOffer {
    #[serde(flatten)]
    pub operation: Operation,
    pub is_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<String>,
}
