//! Event publication mechanics: the `Event` contract, publishable envelopes and a
//! transport-agnostic pub/sub bus.
//!
//! Nothing in here knows about lots or stock; the inventory crate defines its own
//! events on top of these traits.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
