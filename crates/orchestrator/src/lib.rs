pub mod agents;
pub mod context;
pub mod error;
pub mod planner;
pub mod saga;
pub mod service;
pub mod signal;

pub use agents::{
    invoker_from_config, AgentInvoker, AgentRequest, AgentsConfig, HttpAgentClient,
    LocalAgentRunner,
};
pub use context::{ContextStore, InMemoryContextStore};
pub use error::{OrchestratorError, Result};
pub use planner::{PlannerConfig, TaskPlanner};
pub use saga::{InMemorySagaStore, SagaConfig, SagaExecutor, SagaStore};
pub use service::{PlanningOrchestrator, PlanningOutcome, PlanningRequest};
pub use signal::{SignalExtractor, SignalInput};
