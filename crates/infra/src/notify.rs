//! Change notifier that publishes stock changes as event envelopes.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use lotkeeper_core::ProductId;
use lotkeeper_events::{EventBus, EventEnvelope};
use lotkeeper_inventory::{ChangeNotifier, StockChange};

/// Publishes every [`StockChange`] to an event bus as a JSON envelope.
///
/// Sequence numbers are assigned per product, starting at 1. The engines call `notify`
/// while still holding the product's lock, so a product's sequence follows commit order.
/// Delivery is best-effort: a failed publish is logged and dropped, since the batch it
/// describes is already committed.
#[derive(Debug)]
pub struct BusChangeNotifier<B> {
    bus: B,
    sequences: Mutex<HashMap<ProductId, u64>>,
}

impl<B> BusChangeNotifier<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn next_sequence(&self, product_id: &ProductId) -> Option<u64> {
        let mut sequences = self.sequences.lock().ok()?;
        let next = sequences.entry(product_id.clone()).or_insert(0);
        *next += 1;
        Some(*next)
    }
}

impl<B> ChangeNotifier for BusChangeNotifier<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn notify(&self, change: &StockChange) {
        let product_id = change.product_id();
        let Some(sequence) = self.next_sequence(product_id) else {
            warn!(%product_id, "sequence registry poisoned; stock change dropped");
            return;
        };

        let envelope = match EventEnvelope::from_typed(product_id.clone(), sequence, change) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%product_id, error = %err, "failed to serialize stock change");
                return;
            }
        };

        match self.bus.publish(envelope) {
            Ok(()) => debug!(%product_id, sequence, "stock change published"),
            Err(err) => warn!(%product_id, sequence, error = ?err, "failed to publish stock change"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use lotkeeper_events::{Event, InMemoryEventBus};
    use lotkeeper_inventory::{StockReserved, StockTotals};

    use super::*;

    fn reserved(product: &str, delta: u64) -> StockChange {
        StockChange::Reserved(StockReserved {
            product_id: ProductId::parse(product).unwrap(),
            quantity_reserved_delta: delta,
            quantity_available_after: 10 - delta,
            before: StockTotals { available: 10, reserved: 0 },
            after: StockTotals { available: 10 - delta, reserved: delta },
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn publishes_envelopes_with_per_product_sequences() {
        let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let notifier = BusChangeNotifier::new(bus.clone());

        notifier.notify(&reserved("P1", 1));
        notifier.notify(&reserved("P2", 2));
        notifier.notify(&reserved("P1", 3));

        let envs: Vec<_> = (0..3).map(|_| sub.try_recv().unwrap()).collect();
        let seqs: Vec<(String, u64)> = envs
            .iter()
            .map(|e| (e.product_id().to_string(), e.sequence_number()))
            .collect();
        assert_eq!(
            seqs,
            vec![("P1".into(), 1), ("P2".into(), 1), ("P1".into(), 2)]
        );

        let first = &envs[0];
        assert_eq!(first.event_type(), reserved("P1", 1).event_type());
        let payload: StockChange = serde_json::from_value(first.payload().clone()).unwrap();
        assert_eq!(payload.after().reserved, 1);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let notifier = BusChangeNotifier::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new());
        notifier.notify(&reserved("P1", 1));
        assert_eq!(notifier.bus().subscriber_count(), 0);
    }
}
