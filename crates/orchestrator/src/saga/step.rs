use async_trait::async_trait;
use campaign_core::{DEFAULT_STEP_MAX_RETRIES, DEFAULT_STEP_TIMEOUT_MS};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;

/// What a step invocation gets to work with.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub saga_id: Uuid,
    pub step_id: Uuid,
    pub step_name: String,
    pub step_index: usize,
    /// 1-based attempt number
    pub attempt: u32,
    /// Cancelled when the attempt times out; long-running work should watch it.
    pub cancel: CancellationToken,
    /// Output of the preceding step, or for a compensation the output of
    /// the step being undone.
    pub previous: Option<Value>,
}

/// A unit of work or its inverse.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, ctx: StepContext) -> Result<Value>;
}

struct FnAction<F>(F);

#[async_trait]
impl<F, Fut> StepAction for FnAction<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn run(&self, ctx: StepContext) -> Result<Value> {
        (self.0)(ctx).await
    }
}

/// Wrap an async closure as a [`StepAction`]
pub fn step_fn<F, Fut>(f: F) -> Arc<dyn StepAction>
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnAction(f))
}

/// Compensation that has nothing to undo
pub fn no_compensation() -> Arc<dyn StepAction> {
    step_fn(|_ctx| async { Ok(Value::Null) })
}

#[derive(Clone)]
pub struct SagaStep {
    pub id: Uuid,
    pub name: String,
    pub action: Arc<dyn StepAction>,
    pub compensation: Arc<dyn StepAction>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl SagaStep {
    pub fn new(
        name: impl Into<String>,
        action: Arc<dyn StepAction>,
        compensation: Arc<dyn StepAction>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            action,
            compensation,
            timeout: Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS),
            max_retries: DEFAULT_STEP_MAX_RETRIES,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl std::fmt::Debug for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
