//! Downstream agent services that carry out plan actions.

use async_trait::async_trait;
use campaign_core::{Action, ActionType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};
use crate::saga::{StepAction, StepContext};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

const POSITIVE_EMOTION_THRESHOLD: f64 = 0.2;
const NEGATIVE_EMOTION_THRESHOLD: f64 = -0.2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentsConfig {
    /// Root URL of the agent services; actions run locally when unset
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Emotion label passed along with every agent call
pub fn emotion_for(sentiment: f64) -> &'static str {
    if sentiment > POSITIVE_EMOTION_THRESHOLD {
        "positive"
    } else if sentiment < NEGATIVE_EMOTION_THRESHOLD {
        "negative"
    } else {
        "neutral"
    }
}

/// Body of an agent call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub session_id: String,
    pub action_type: ActionType,
    pub platforms: Vec<String>,
    pub emotion: String,
    pub parameters: BTreeMap<String, Value>,
    /// Output of the previous stage
    pub previous: Option<Value>,
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent: &str, request: &AgentRequest) -> Result<Value>;

    async fn compensate(&self, agent: &str, request: &AgentRequest) -> Result<Value>;
}

/// Responses are handed to the next stage with the request's emotion attached.
fn with_emotion(response: Value, emotion: &str) -> Value {
    let mut object = match response {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("result".to_string(), other);
            wrapped
        }
    };
    object.insert("emotion".to_string(), Value::String(emotion.to_string()));
    Value::Object(object)
}

/// Calls agents at `<base>/agents/<agent>/<action>` over HTTP.
pub struct HttpAgentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn action_url(&self, agent: &str, action_type: ActionType) -> String {
        format!("{}/agents/{}/{}", self.base_url, agent, action_type.slug())
    }

    async fn post(&self, url: &str, request: &AgentRequest) -> Result<Value> {
        debug!(url = %url, session_id = %request.session_id, "Calling agent");
        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::step_failed(
                request.action_type.as_str(),
                format!("agent at {} returned {}: {}", url, status, body),
            ));
        }

        let body: Value = response.json().await?;
        Ok(with_emotion(body, &request.emotion))
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentClient {
    async fn invoke(&self, agent: &str, request: &AgentRequest) -> Result<Value> {
        let url = self.action_url(agent, request.action_type);
        self.post(&url, request).await
    }

    async fn compensate(&self, agent: &str, request: &AgentRequest) -> Result<Value> {
        let url = format!("{}/compensate", self.action_url(agent, request.action_type));
        self.post(&url, request).await
    }
}

/// Stand-in used when no agent services are configured; acknowledges every
/// call without side effects.
#[derive(Debug, Default, Clone)]
pub struct LocalAgentRunner;

#[async_trait]
impl AgentInvoker for LocalAgentRunner {
    async fn invoke(&self, agent: &str, request: &AgentRequest) -> Result<Value> {
        info!(
            agent = %agent,
            action = request.action_type.as_str(),
            session_id = %request.session_id,
            "Running action locally"
        );
        Ok(with_emotion(
            json!({
                "agent": agent,
                "action": request.action_type.as_str(),
                "status": "accepted",
                "platforms": request.platforms,
            }),
            &request.emotion,
        ))
    }

    async fn compensate(&self, agent: &str, request: &AgentRequest) -> Result<Value> {
        info!(
            agent = %agent,
            action = request.action_type.as_str(),
            "Reverting action locally"
        );
        Ok(json!({ "agent": agent, "status": "reverted" }))
    }
}

/// Build the invoker the configuration asks for.
pub fn invoker_from_config(config: &AgentsConfig) -> Result<Arc<dyn AgentInvoker>> {
    match &config.base_url {
        Some(base_url) => Ok(Arc::new(HttpAgentClient::new(
            base_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?)),
        None => Ok(Arc::new(LocalAgentRunner)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Compensate,
}

/// Saga step that forwards one plan action to its primary agent.
pub struct AgentStep {
    invoker: Arc<dyn AgentInvoker>,
    agent: String,
    request: AgentRequest,
    direction: Direction,
}

impl AgentStep {
    /// Action and compensation for `action`, sent to the first agent it requires.
    pub fn pair(
        invoker: Arc<dyn AgentInvoker>,
        action: &Action,
        session_id: &str,
        platforms: &[String],
        emotion: &str,
    ) -> (Arc<dyn StepAction>, Arc<dyn StepAction>) {
        let agent = action
            .required_agents
            .first()
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        let request = AgentRequest {
            session_id: session_id.to_string(),
            action_type: action.action_type,
            platforms: platforms.to_vec(),
            emotion: emotion.to_string(),
            parameters: action.parameters.clone(),
            previous: None,
        };

        let forward = AgentStep {
            invoker: invoker.clone(),
            agent: agent.clone(),
            request: request.clone(),
            direction: Direction::Forward,
        };
        let compensate = AgentStep {
            invoker,
            agent,
            request,
            direction: Direction::Compensate,
        };
        (Arc::new(forward), Arc::new(compensate))
    }
}

#[async_trait]
impl StepAction for AgentStep {
    async fn run(&self, ctx: StepContext) -> Result<Value> {
        let mut request = self.request.clone();
        request.previous = ctx.previous;

        let call = async {
            match self.direction {
                Direction::Forward => self.invoker.invoke(&self.agent, &request).await,
                Direction::Compensate => self.invoker.compensate(&self.agent, &request).await,
            }
        };

        tokio::select! {
            result = call => result,
            _ = ctx.cancel.cancelled() => Err(OrchestratorError::step_failed(
                ctx.step_name.clone(),
                "cancelled",
            )),
        }
    }
}
