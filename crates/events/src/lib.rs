//! Event system for the orchestration engine
//!
//! This crate provides the event bus, the transport it publishes through and
//! the event types exchanged between planner, saga executor and orchestrator.

mod bus;
mod error;
mod retry;
mod transport;
mod types;

pub use bus::{
    handler_fn, DeadLetterHandler, EventBus, EventBusConfig, EventBusStats, EventHandler,
    SubscriptionOptions, DEFAULT_CHANNEL_PREFIX, DEFAULT_DEAD_LETTER_CHANNEL,
};
pub use error::{EventError, HandlerError, HandlerResult, Result};
pub use retry::{RetryPolicy, RetryScheduler};
pub use transport::{channel_matches, InMemoryTransport, Transport, TransportMessage};
pub use types::*;
