use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum CompetitionLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl CompetitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Structured summary of trend and engagement signals.
///
/// This is the sole input to plan generation. It is never mutated once
/// built; callers that need a variation construct a new value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SignalAnalysis {
    pub tenant_id: String,
    pub session_id: String,
    pub user_id: String,
    /// Fraction of the audience that engages, in `[0, 1]`
    pub engagement_rate: f64,
    pub audience_size: u64,
    #[serde(default)]
    pub trending_topics: Vec<String>,
    #[serde(default)]
    pub trending_hashtags: Vec<String>,
    #[serde(default)]
    pub content_types: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub competition_level: CompetitionLevel,
    #[serde(default)]
    pub peak_times: Vec<String>,
    /// Lexicon sentiment in `[-1, 1]`
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SignalAnalysis {
    pub fn new(
        tenant_id: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            engagement_rate: 0.0,
            audience_size: 0,
            trending_topics: Vec::new(),
            trending_hashtags: Vec::new(),
            content_types: Vec::new(),
            platforms: Vec::new(),
            competition_level: CompetitionLevel::default(),
            peak_times: Vec::new(),
            sentiment_score: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn with_engagement_rate(mut self, rate: f64) -> Self {
        self.engagement_rate = rate;
        self
    }

    pub fn with_audience_size(mut self, size: u64) -> Self {
        self.audience_size = size;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.trending_topics = topics;
        self
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.trending_hashtags = hashtags;
        self
    }

    pub fn with_content_types(mut self, content_types: Vec<String>) -> Self {
        self.content_types = content_types;
        self
    }

    pub fn with_platforms(mut self, platforms: Vec<String>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_competition(mut self, level: CompetitionLevel) -> Self {
        self.competition_level = level;
        self
    }

    pub fn with_peak_times(mut self, peak_times: Vec<String>) -> Self {
        self.peak_times = peak_times;
        self
    }

    pub fn with_sentiment(mut self, score: f64) -> Self {
        self.sentiment_score = score;
        self
    }

    pub fn has_content_type(&self, content_type: &str) -> bool {
        self.content_types
            .iter()
            .any(|c| c.eq_ignore_ascii_case(content_type))
    }

    /// Check the numeric ranges the planner relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tenant_id.trim().is_empty() {
            return Err(CoreError::Validation("tenantId must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.engagement_rate) {
            return Err(CoreError::Validation(format!(
                "engagementRate must be within [0, 1], got {}",
                self.engagement_rate
            )));
        }
        if !(-1.0..=1.0).contains(&self.sentiment_score) {
            return Err(CoreError::Validation(format!(
                "sentimentScore must be within [-1, 1], got {}",
                self.sentiment_score
            )));
        }
        Ok(())
    }
}
