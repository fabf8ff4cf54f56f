use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::player::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

string_enum!(Trend {
    Up => "up",
    Down => "down",
    Stable => "stable",
});

impl Trend {
    pub fn from_change(fraction: f64) -> Self {
        if fraction > 0.0 {
            Trend::Up
        } else if fraction < 0.0 {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketListing {
    pub id: Uuid,
    pub resource: ResourceKind,
    pub price: i64,
    pub trend: Trend,
    pub trend_percentage: i64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub id: Uuid,
    pub resource: ResourceKind,
    pub price: i64,
    pub timestamp: DateTime<Utc>,
}

impl PriceHistory {
    pub fn record(resource: ResourceKind, price: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource,
            price,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TransactionKind {
    Buy,
    Sell,
}

string_enum!(TransactionKind {
    Buy => "buy",
    Sell => "sell",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTransaction {
    pub id: Uuid,
    pub player_id: Uuid,
    pub resource: ResourceKind,
    pub quantity: i64,
    pub price: i64,
    /// Paid on a buy, received on a sell.
    pub total: i64,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}
