use async_trait::async_trait;
use campaign_core::{ConversationMessage, SessionContext};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{OrchestratorError, Result};

/// Conversation state per `(tenant, session)`.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn get_context(&self, tenant_id: &str, session_id: &str)
        -> Result<Option<SessionContext>>;

    async fn create_context(
        &self,
        tenant_id: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<SessionContext>;

    async fn add_conversation_message(
        &self,
        tenant_id: &str,
        session_id: &str,
        message: ConversationMessage,
    ) -> Result<()>;
}

type SessionKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryContextStore {
    sessions: RwLock<HashMap<SessionKey, SessionContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(tenant_id: &str, session_id: &str) -> SessionKey {
    (tenant_id.to_string(), session_id.to_string())
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn get_context(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Option<SessionContext>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&key(tenant_id, session_id))
            .cloned())
    }

    async fn create_context(
        &self,
        tenant_id: &str,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<SessionContext> {
        let mut sessions = self.sessions.write().await;
        let context = sessions
            .entry(key(tenant_id, session_id))
            .or_insert_with(|| {
                SessionContext::new(tenant_id, session_id, user_id.map(str::to_string))
            });
        Ok(context.clone())
    }

    async fn add_conversation_message(
        &self,
        tenant_id: &str,
        session_id: &str,
        message: ConversationMessage,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let context = sessions.get_mut(&key(tenant_id, session_id)).ok_or_else(|| {
            OrchestratorError::Context(format!(
                "no session {} for tenant {}",
                session_id, tenant_id
            ))
        })?;
        context.push(message);
        Ok(())
    }
}
