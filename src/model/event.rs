use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event types pushed to subscribers. The string is the SSE `event:` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    Connected,
    Heartbeat,
    HotspotUpdated,
    HotspotsUpdated,
    /// Sent to the previous controller when a takeover succeeds.
    TerritoryLost,
    /// Sent to the controller when a takeover against them fails.
    TerritoryDefended,
    IncomeGenerated,
    MarketUpdated,
    OperationsRefreshed,
    PlayerRegionChanged,
    Notification,
}

string_enum!(EventKind {
    Connected => "connected",
    Heartbeat => "heartbeat",
    HotspotUpdated => "hotspot_updated",
    HotspotsUpdated => "hotspots_updated",
    TerritoryLost => "territory_lost",
    TerritoryDefended => "territory_defended",
    IncomeGenerated => "income_generated",
    MarketUpdated => "market_updated",
    OperationsRefreshed => "operations_refreshed",
    PlayerRegionChanged => "player_region_changed",
    Notification => "notification",
});

/// Category carried by `notification` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum NotificationCategory {
    Territory,
    Operation,
    Collection,
    Progression,
    Travel,
    System,
}

string_enum!(NotificationCategory {
    Territory => "territory",
    Operation => "operation",
    Collection => "collection",
    Progression => "progression",
    Travel => "travel",
    System => "system",
});

/// One published event: the type plus its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: EventKind,
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// `{"event": kind, ...payload}`. A non-object payload lands under `data`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("event".to_string(), Value::String(self.kind.to_string()));
        match &self.payload {
            Value::Object(fields) => {
                for (k, v) in fields {
                    if k != "event" {
                        body.insert(k.clone(), v.clone());
                    }
                }
            }
            Value::Null => {}
            other => {
                body.insert("data".to_string(), other.clone());
            }
        }
        Value::Object(body)
    }

    /// Server-sent-events wire frame: `event: <type>\ndata: <json>\n\n`.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.kind, self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_merges_object_payload() {
        let env = Envelope::new(EventKind::HotspotUpdated, json!({"hotspot": {"id": "x"}}));
        assert_eq!(
            env.to_json(),
            json!({"event": "hotspot_updated", "hotspot": {"id": "x"}})
        );
    }

    #[test]
    fn payload_cannot_override_event_name() {
        let env = Envelope::new(EventKind::Heartbeat, json!({"event": "spoofed", "timestamp": "t"}));
        assert_eq!(env.to_json()["event"], "heartbeat");
    }

    #[test]
    fn scalar_payload_goes_under_data() {
        let env = Envelope::new(EventKind::Notification, json!(42));
        assert_eq!(env.to_json(), json!({"event": "notification", "data": 42}));
    }

    #[test]
    fn sse_frame_layout() {
        let env = Envelope::new(EventKind::Connected, Value::Null);
        assert_eq!(
            env.to_sse_frame(),
            "event: connected\ndata: {\"event\":\"connected\"}\n\n"
        );
    }
}
