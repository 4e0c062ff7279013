use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lotkeeper_core::ProductId;

use crate::Event;

/// Envelope for a published event, carrying stream metadata.
///
/// Streams are keyed by product: every stock change of one product lands in the same
/// stream, and `sequence_number` increases monotonically within the publisher that
/// produced it. Consumers use it to drop duplicates and stale deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    product_id: ProductId,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    /// Monotonically increasing position assigned by the publisher.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        product_id: ProductId,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            product_id,
            event_type: event_type.into(),
            event_version,
            occurred_at,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Wrap a typed event as a JSON envelope, capturing its metadata.
    pub fn from_typed<T>(
        product_id: ProductId,
        sequence_number: u64,
        event: &T,
    ) -> Result<Self, serde_json::Error>
    where
        T: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            Uuid::now_v7(),
            product_id,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            sequence_number,
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Restocked {
        quantity: u64,
        at: DateTime<Utc>,
    }

    impl Event for Restocked {
        fn event_type(&self) -> &'static str {
            "test.restocked"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_typed_captures_event_metadata() {
        let at = Utc::now();
        let product_id = ProductId::parse("P1").unwrap();
        let env = EventEnvelope::from_typed(product_id.clone(), 7, &Restocked { quantity: 4, at })
            .unwrap();

        assert_eq!(env.product_id(), &product_id);
        assert_eq!(env.event_type(), "test.restocked");
        assert_eq!(env.event_version(), 2);
        assert_eq!(env.occurred_at(), at);
        assert_eq!(env.sequence_number(), 7);
        assert_eq!(env.payload()["quantity"], 4);
    }
}
