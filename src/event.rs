// 📜 Event - audit trail entry for every state change
//
// One event per successful mutating call. Rejected calls leave no trace here.

use crate::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    ContractDeployed,
    ValueSet,
    TimestampedValueSet,
    InstanceDeployed,
    InstanceValueSet,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ContractDeployed => "ContractDeployed",
            EventType::ValueSet => "ValueSet",
            EventType::TimestampedValueSet => "TimestampedValueSet",
            EventType::InstanceDeployed => "InstanceDeployed",
            EventType::InstanceValueSet => "InstanceValueSet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ContractDeployed" => Some(EventType::ContractDeployed),
            "ValueSet" => Some(EventType::ValueSet),
            "TimestampedValueSet" => Some(EventType::TimestampedValueSet),
            "InstanceDeployed" => Some(EventType::InstanceDeployed),
            "InstanceValueSet" => Some(EventType::InstanceValueSet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Contract whose state changed
    pub contract: Address,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: EventType,
        contract: Address,
        data: serde_json::Value,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            event_type,
            contract,
            data,
            actor: actor.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        for ty in [
            EventType::ContractDeployed,
            EventType::ValueSet,
            EventType::TimestampedValueSet,
            EventType::InstanceDeployed,
            EventType::InstanceValueSet,
        ] {
            assert_eq!(EventType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(EventType::parse("Unknown"), None);
    }

    #[test]
    fn test_event_ids_unique() {
        let now = Utc::now();
        let a = Event::new(EventType::ValueSet, Address::ZERO, serde_json::json!({}), "cli", now);
        let b = Event::new(EventType::ValueSet, Address::ZERO, serde_json::json!({}), "cli", now);
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.event_type, EventType::ValueSet);
    }
}
