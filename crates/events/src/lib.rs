//! Notifications: event contract, envelopes, pub/sub and command execution.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::{execute, execute_settled};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
