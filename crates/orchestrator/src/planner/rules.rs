//! Deterministic rules turning a signal analysis into candidate actions,
//! a confidence score, a plan priority and risk labels.

use campaign_core::{
    Action, ActionType, CompetitionLevel, SignalAnalysis, MAX_PLAN_PRIORITY, MIN_PLAN_PRIORITY,
};
use serde_json::json;

pub const AUDIENCE_ANALYSIS_THRESHOLD: u64 = 5_000;
pub const LARGE_AUDIENCE_THRESHOLD: u64 = 10_000;
pub const SMALL_AUDIENCE_THRESHOLD: u64 = 1_000;
pub const HIGH_ENGAGEMENT_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_SENTIMENT_THRESHOLD: f64 = -0.3;
pub const COMPLEX_PLAN_RISK_ACTIONS: usize = 4;
pub const COMPLEX_PLAN_PENALTY_ACTIONS: usize = 5;

const BASE_CONFIDENCE: f64 = 0.5;
const BASE_PLAN_PRIORITY: i32 = 3;

pub mod risk {
    pub const HIGH_COMPETITION: &str = "high_competition";
    pub const COMPLEX_EXECUTION: &str = "complex_execution";
    pub const SMALL_AUDIENCE: &str = "small_audience";
    pub const NEGATIVE_SENTIMENT: &str = "negative_sentiment";
}

pub mod factor {
    pub const HIGH_ENGAGEMENT: &str = "high_engagement";
    pub const LARGE_AUDIENCE: &str = "large_audience";
    pub const LOW_COMPETITION: &str = "low_competition";
    pub const POSITIVE_SENTIMENT: &str = "positive_sentiment";
    pub const HIGH_COMPETITION: &str = "high_competition";
    pub const COMPLEX_PLAN: &str = "complex_plan";
}

const ANALYTICS: &[&str] = &["analytics"];
const CONTENT: &[&str] = &["content"];
const VIDEO: &[&str] = &["content", "video"];
const TIMING: &[&str] = &["analytics", "scheduling"];
const SCHEDULING: &[&str] = &["scheduling"];

/// Base priority, duration (seconds) and agents for each action kind
pub fn catalog(action_type: ActionType) -> (u8, u64, &'static [&'static str]) {
    match action_type {
        ActionType::AnalyzeAudience => (1, 120, ANALYTICS),
        ActionType::GenerateContent => (2, 300, CONTENT),
        ActionType::CreateVideo => (3, 600, VIDEO),
        ActionType::OptimizeTiming => (4, 60, TIMING),
        ActionType::SchedulePost => (5, 30, SCHEDULING),
    }
}

fn catalog_action(action_type: ActionType) -> Action {
    let (priority, duration, agents) = catalog(action_type);
    Action::new(action_type, priority, duration).with_agents(agents.iter().copied())
}

/// Candidate actions in rule order, before sequencing.
pub fn derive_actions(signal: &SignalAnalysis) -> Vec<Action> {
    let mut actions = Vec::new();

    if signal.audience_size > AUDIENCE_ANALYSIS_THRESHOLD {
        actions.push(
            catalog_action(ActionType::AnalyzeAudience)
                .with_parameter("audienceSize", json!(signal.audience_size))
                .with_parameter("platforms", json!(signal.platforms)),
        );
    }

    if signal.engagement_rate > HIGH_ENGAGEMENT_THRESHOLD && signal.has_content_type("video") {
        actions.push(
            catalog_action(ActionType::CreateVideo)
                .with_parameter("topics", json!(signal.trending_topics))
                .with_parameter("platforms", json!(signal.platforms)),
        );
    }

    if signal.competition_level != CompetitionLevel::High {
        actions.push(
            catalog_action(ActionType::GenerateContent)
                .with_parameter("topics", json!(signal.trending_topics))
                .with_parameter("hashtags", json!(signal.trending_hashtags))
                .with_parameter("contentTypes", json!(signal.content_types)),
        );
    }

    let timing = catalog_action(ActionType::OptimizeTiming)
        .with_parameter("peakTimes", json!(signal.peak_times))
        .with_parameter("platforms", json!(signal.platforms));
    let timing_id = timing.id;
    actions.push(timing);

    actions.push(
        catalog_action(ActionType::SchedulePost)
            .with_dependency(timing_id)
            .with_parameter("platforms", json!(signal.platforms)),
    );

    actions
}

/// Additive confidence score clamped to `[0, 1]`, with the factors that moved it.
pub fn confidence(signal: &SignalAnalysis, action_count: usize) -> (f64, Vec<String>) {
    let mut score = BASE_CONFIDENCE;
    let mut applied = Vec::new();

    if signal.engagement_rate > HIGH_ENGAGEMENT_THRESHOLD {
        score += 0.15;
        applied.push(factor::HIGH_ENGAGEMENT.to_string());
    }
    if signal.audience_size > LARGE_AUDIENCE_THRESHOLD {
        score += 0.10;
        applied.push(factor::LARGE_AUDIENCE.to_string());
    }
    if signal.competition_level == CompetitionLevel::Low {
        score += 0.10;
        applied.push(factor::LOW_COMPETITION.to_string());
    }
    if signal.sentiment_score > 0.0 {
        score += 0.05;
        applied.push(factor::POSITIVE_SENTIMENT.to_string());
    }
    if signal.competition_level == CompetitionLevel::High {
        score -= 0.15;
        applied.push(factor::HIGH_COMPETITION.to_string());
    }
    if action_count > COMPLEX_PLAN_PENALTY_ACTIONS {
        score -= 0.05;
        applied.push(factor::COMPLEX_PLAN.to_string());
    }

    // Two decimals keeps 0.5 + 0.15 + ... from surfacing float noise.
    let score = (score.clamp(0.0, 1.0) * 100.0).round() / 100.0;
    (score, applied)
}

pub fn plan_priority(signal: &SignalAnalysis) -> u8 {
    let mut priority = BASE_PLAN_PRIORITY;
    if signal.engagement_rate > HIGH_ENGAGEMENT_THRESHOLD {
        priority += 1;
    }
    if signal.audience_size > LARGE_AUDIENCE_THRESHOLD {
        priority += 1;
    }
    if signal.competition_level == CompetitionLevel::High {
        priority -= 1;
    }
    priority.clamp(MIN_PLAN_PRIORITY as i32, MAX_PLAN_PRIORITY as i32) as u8
}

pub fn risks(signal: &SignalAnalysis, action_count: usize) -> Vec<String> {
    let mut found = Vec::new();

    if signal.competition_level == CompetitionLevel::High {
        found.push(risk::HIGH_COMPETITION.to_string());
    }
    if action_count > COMPLEX_PLAN_RISK_ACTIONS {
        found.push(risk::COMPLEX_EXECUTION.to_string());
    }
    if signal.audience_size < SMALL_AUDIENCE_THRESHOLD {
        found.push(risk::SMALL_AUDIENCE.to_string());
    }
    if signal.sentiment_score < NEGATIVE_SENTIMENT_THRESHOLD {
        found.push(risk::NEGATIVE_SENTIMENT.to_string());
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> SignalAnalysis {
        SignalAnalysis::new("tenant", "session", "user")
    }

    fn types(actions: &[Action]) -> Vec<ActionType> {
        actions.iter().map(|a| a.action_type).collect()
    }

    #[test]
    fn test_minimal_signal_yields_timing_and_schedule() {
        let actions = derive_actions(&signal().with_competition(CompetitionLevel::High));

        assert_eq!(
            types(&actions),
            vec![ActionType::OptimizeTiming, ActionType::SchedulePost]
        );
        assert_eq!(actions[1].dependencies, vec![actions[0].id]);
    }

    #[test]
    fn test_audience_threshold_is_strict() {
        let at = derive_actions(&signal().with_audience_size(5_000));
        let above = derive_actions(&signal().with_audience_size(5_001));

        assert!(!types(&at).contains(&ActionType::AnalyzeAudience));
        assert_eq!(
            types(&above)
                .iter()
                .filter(|t| **t == ActionType::AnalyzeAudience)
                .count(),
            1
        );
    }

    #[test]
    fn test_video_requires_engagement_and_content_type() {
        let no_video = derive_actions(&signal().with_engagement_rate(0.2));
        let low_engagement = derive_actions(
            &signal()
                .with_engagement_rate(0.05)
                .with_content_types(vec!["video".to_string()]),
        );
        let both = derive_actions(
            &signal()
                .with_engagement_rate(0.06)
                .with_content_types(vec!["video".to_string()]),
        );

        assert!(!types(&no_video).contains(&ActionType::CreateVideo));
        assert!(!types(&low_engagement).contains(&ActionType::CreateVideo));
        assert!(types(&both).contains(&ActionType::CreateVideo));
    }

    #[test]
    fn test_confidence_example() {
        let s = signal()
            .with_audience_size(15_000)
            .with_engagement_rate(0.07)
            .with_competition(CompetitionLevel::Low)
            .with_sentiment(0.3);

        let (score, applied) = confidence(&s, 5);

        assert!((score - 0.90).abs() < 1e-9);
        assert_eq!(applied.len(), 4);
        assert!(!applied.contains(&factor::COMPLEX_PLAN.to_string()));
    }

    #[test]
    fn test_confidence_penalties() {
        let s = signal().with_competition(CompetitionLevel::High);

        let (score, applied) = confidence(&s, 6);

        assert!((score - 0.30).abs() < 1e-9);
        assert_eq!(
            applied,
            vec![
                factor::HIGH_COMPETITION.to_string(),
                factor::COMPLEX_PLAN.to_string()
            ]
        );
    }

    #[test]
    fn test_plan_priority_bounds() {
        let hot = signal()
            .with_engagement_rate(0.5)
            .with_audience_size(1_000_000);
        let cold = signal().with_competition(CompetitionLevel::High);

        assert_eq!(plan_priority(&hot), 5);
        assert_eq!(plan_priority(&cold), 2);
        assert_eq!(plan_priority(&signal()), 3);
    }

    #[test]
    fn test_risk_labels() {
        let s = signal()
            .with_competition(CompetitionLevel::High)
            .with_audience_size(10)
            .with_sentiment(-0.5);

        assert_eq!(
            risks(&s, 5),
            vec![
                risk::HIGH_COMPETITION.to_string(),
                risk::COMPLEX_EXECUTION.to_string(),
                risk::SMALL_AUDIENCE.to_string(),
                risk::NEGATIVE_SENTIMENT.to_string(),
            ]
        );

        let calm = signal().with_audience_size(5_000).with_sentiment(-0.3);
        assert!(risks(&calm, 4).is_empty());
    }
}
