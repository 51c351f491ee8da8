//! Event types for the orchestration event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Default delivery attempts before an event is dead-lettered
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Well-known event types emitted by the engine.
pub mod event_types {
    /// The task planner produced a plan
    pub const PLAN_GENERATED: &str = "PLAN_GENERATED";
    /// A saga started executing its first step
    pub const SAGA_STARTED: &str = "SAGA_STARTED";
    /// Every saga step succeeded
    pub const SAGA_COMPLETED: &str = "SAGA_COMPLETED";
    /// A saga exhausted its retries and was rolled back
    pub const SAGA_FAILED: &str = "SAGA_FAILED";
    /// A planning request ran to completion
    pub const ORCHESTRATION_COMPLETED: &str = "ORCHESTRATION_COMPLETED";
    /// A planning request aborted
    pub const ORCHESTRATION_FAILED: &str = "ORCHESTRATION_FAILED";
}

/// A message travelling over the event bus.
///
/// `id`, `timestamp` and `retry_count` are stamped by the bus on publish;
/// values set by the caller are overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub tenant_id: String,
    pub session_id: Option<String>,
    #[schema(value_type = Object)]
    #[cfg_attr(feature = "typescript", ts(type = "unknown"))]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Event {
    pub fn new(event_type: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            tenant_id: tenant_id.into(),
            session_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether another delivery attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Envelope written to the dead-letter channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub failure_reason: String,
    pub failed_at: DateTime<Utc>,
    pub original_event: Event,
}

impl DeadLetter {
    pub fn new(original_event: Event, failure_reason: impl Into<String>) -> Self {
        Self {
            failure_reason: failure_reason.into(),
            failed_at: Utc::now(),
            original_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = Event::new(event_types::PLAN_GENERATED, "tenant-1")
            .with_session("session-1")
            .with_payload(serde_json::json!({"actions": 5}));

        assert!(!event.id.is_nil());
        assert!(event.timestamp <= Utc::now());
        assert_eq!(event.retry_count, 0);
        assert_eq!(event.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(event.session_id.as_deref(), Some("session-1"));
        assert_eq!(event.payload["actions"], 5);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new("SAGA_FAILED", "tenant-1");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SAGA_FAILED\""));
        assert!(json.contains("retryCount"));
        assert!(json.contains("maxRetries"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "PLAN_GENERATED",
            "tenantId": "t1",
            "sessionId": null,
            "payload": {"planId": "p"},
            "timestamp": "2024-01-01T00:00:00Z",
            "retryCount": 2,
            "maxRetries": 3
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_type, "PLAN_GENERATED");
        assert_eq!(event.retry_count, 2);
        assert!(event.can_retry());
    }

    #[test]
    fn test_can_retry_boundary() {
        let mut event = Event::new("x", "t").with_max_retries(1);
        assert!(event.can_retry());

        event.retry_count = 1;
        assert!(!event.can_retry());
    }

    #[test]
    fn test_dead_letter_wraps_original() {
        let event = Event::new("PLAN_GENERATED", "tenant-1");
        let letter = DeadLetter::new(event.clone(), "handler exploded");

        let json = serde_json::to_value(&letter).unwrap();
        assert_eq!(json["failureReason"], "handler exploded");
        assert_eq!(json["originalEvent"]["id"], event.id.to_string());
        assert!(json.get("failedAt").is_some());
    }
}
