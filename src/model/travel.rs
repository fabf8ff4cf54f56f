use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: Uuid,
    pub name: String,
}

impl Region {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
        }
    }
}

/// Write-once record of a travel attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelAttempt {
    pub id: Uuid,
    pub player_id: Uuid,
    pub from_region_id: Option<Uuid>,
    pub to_region_id: Uuid,
    pub success: bool,
    pub caught: bool,
    pub fine: Option<i64>,
    pub heat_delta: i64,
    pub cost: i64,
    pub timestamp: DateTime<Utc>,
}

/// What the caller learns about a travel request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelOutcome {
    pub success: bool,
    pub region_id: Uuid,
    pub region_name: String,
    pub travel_cost: i64,
    pub caught: bool,
    pub fine: i64,
    pub heat_increase: i64,
    pub heat_reduction: i64,
    pub message: String,
}
