//! Compensating-transaction pipeline over plan actions.

mod executor;
mod state_machine;
mod step;
mod store;

pub use executor::{Saga, SagaConfig, SagaExecutor};
pub use state_machine::SagaStateMachine;
pub use step::{no_compensation, step_fn, SagaStep, StepAction, StepContext};
pub use store::{InMemorySagaStore, SagaStore};
