use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comanda_core::CompanyId;

/// An event plus the metadata added when it was published.
///
/// - `sequence` is the 1-based position inside its unit of work.
/// - `depth` is 0 for events raised by a use case and `n + 1` for events
///   raised by a reactor handling a depth-`n` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    unit_of_work_id: Uuid,
    company_id: CompanyId,
    event_type: String,
    aggregate_id: Uuid,
    occurred_at: DateTime<Utc>,
    sequence: u64,
    depth: u32,
    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        unit_of_work_id: Uuid,
        company_id: CompanyId,
        event_type: impl Into<String>,
        aggregate_id: Uuid,
        occurred_at: DateTime<Utc>,
        sequence: u64,
        depth: u32,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            unit_of_work_id,
            company_id,
            event_type: event_type.into(),
            aggregate_id,
            occurred_at,
            sequence,
            depth,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn unit_of_work_id(&self) -> Uuid {
        self.unit_of_work_id
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_metadata_next_to_payload() {
        let envelope = EventEnvelope::new(
            Uuid::nil(),
            Uuid::nil(),
            CompanyId::from_uuid(Uuid::nil()),
            "dining.command",
            Uuid::nil(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            1,
            0,
            serde_json::json!({ "command_id": "c-1" }),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event_type"], "dining.command");
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["payload"]["command_id"], "c-1");

        let back: EventEnvelope<serde_json::Value> = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }
}
