//! Heuristic signal analysis of a free-text campaign request.

use campaign_core::{CompetitionLevel, SignalAnalysis};
use regex::Regex;
use std::collections::BTreeSet;

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_ENGAGEMENT_RATE: f64 = 0.03;
pub const DEFAULT_AUDIENCE_SIZE: u64 = 1_000;
pub const DEFAULT_PLATFORM: &str = "instagram";

/// Keyword to topic
const TOPIC_LEXICON: &[(&str, &str)] = &[
    ("fitness", "fitness"),
    ("workout", "fitness"),
    ("gym", "fitness"),
    ("food", "food"),
    ("recipe", "food"),
    ("cooking", "food"),
    ("travel", "travel"),
    ("vacation", "travel"),
    ("fashion", "fashion"),
    ("outfit", "fashion"),
    ("style", "fashion"),
    ("tech", "technology"),
    ("technology", "technology"),
    ("ai", "technology"),
    ("gaming", "gaming"),
    ("game", "gaming"),
    ("music", "music"),
    ("song", "music"),
    ("beauty", "beauty"),
    ("makeup", "beauty"),
    ("skincare", "beauty"),
    ("finance", "finance"),
    ("crypto", "finance"),
    ("investing", "finance"),
    ("education", "education"),
    ("tutorial", "education"),
    ("pets", "pets"),
    ("dog", "pets"),
    ("cat", "pets"),
];

const CONTENT_TYPE_LEXICON: &[(&str, &str)] = &[
    ("video", "video"),
    ("videos", "video"),
    ("reel", "video"),
    ("reels", "video"),
    ("clip", "video"),
    ("shorts", "video"),
    ("image", "image"),
    ("photo", "image"),
    ("photos", "image"),
    ("picture", "image"),
    ("carousel", "carousel"),
    ("slides", "carousel"),
    ("story", "story"),
    ("stories", "story"),
    ("thread", "text"),
    ("caption", "text"),
    ("blog", "text"),
];

const PLATFORM_LEXICON: &[&str] = &[
    "tiktok",
    "instagram",
    "youtube",
    "twitter",
    "facebook",
    "linkedin",
];

const POSITIVE_WORDS: &[&str] = &[
    "love", "great", "amazing", "awesome", "excited", "happy", "best", "fun", "good",
    "excellent", "viral", "win",
];

const NEGATIVE_WORDS: &[&str] = &[
    "hate", "bad", "terrible", "awful", "boring", "sad", "worst", "angry", "fail", "poor",
    "problem", "drop",
];

fn peak_times(platform: &str) -> &'static [&'static str] {
    match platform {
        "tiktok" => &["19:00", "21:00"],
        "instagram" => &["11:00", "19:00"],
        "youtube" => &["15:00", "20:00"],
        "twitter" => &["09:00", "12:00"],
        "facebook" => &["13:00", "15:00"],
        "linkedin" => &["08:00", "12:00"],
        _ => &[],
    }
}

/// Everything the extractor looks at besides the message text.
#[derive(Debug, Clone, Default)]
pub struct SignalInput {
    pub tenant_id: String,
    pub session_id: String,
    pub user_id: String,
    pub message: String,
    /// Overrides platforms mentioned in the message
    pub platforms: Option<Vec<String>>,
    pub engagement_rate: Option<f64>,
    pub audience_size: Option<u64>,
}

pub struct SignalExtractor {
    hashtag: Regex,
}

impl SignalExtractor {
    pub fn new() -> Result<Self> {
        let hashtag = Regex::new(r"#([A-Za-z0-9_]+)")
            .map_err(|e| OrchestratorError::Planning(format!("hashtag pattern: {e}")))?;
        Ok(Self { hashtag })
    }

    pub fn extract(&self, input: &SignalInput) -> SignalAnalysis {
        let words = words(&input.message);

        let topics = collect_unique(
            words
                .iter()
                .filter_map(|w| lookup(TOPIC_LEXICON, w))
                .map(str::to_string),
        );

        let mut hashtags: Vec<String> = collect_unique(
            self.hashtag
                .captures_iter(&input.message)
                .map(|c| format!("#{}", c[1].to_lowercase())),
        );
        for topic in &topics {
            let tag = format!("#{topic}");
            if !hashtags.contains(&tag) {
                hashtags.push(tag);
            }
        }

        let mut content_types = collect_unique(
            words
                .iter()
                .filter_map(|w| lookup(CONTENT_TYPE_LEXICON, w))
                .map(str::to_string),
        );
        if content_types.is_empty() {
            content_types.push("text".to_string());
        }

        let platforms = match &input.platforms {
            Some(platforms) if !platforms.is_empty() => {
                collect_unique(platforms.iter().map(|p| p.to_lowercase()))
            }
            _ => {
                let mentioned = collect_unique(
                    words
                        .iter()
                        .filter(|w| PLATFORM_LEXICON.contains(&w.as_str()))
                        .cloned(),
                );
                if mentioned.is_empty() {
                    vec![DEFAULT_PLATFORM.to_string()]
                } else {
                    mentioned
                }
            }
        };

        let peak = collect_unique(
            platforms
                .iter()
                .flat_map(|p| peak_times(p).iter())
                .map(|t| t.to_string()),
        );

        SignalAnalysis::new(&input.tenant_id, &input.session_id, &input.user_id)
            .with_engagement_rate(input.engagement_rate.unwrap_or(DEFAULT_ENGAGEMENT_RATE))
            .with_audience_size(input.audience_size.unwrap_or(DEFAULT_AUDIENCE_SIZE))
            .with_competition(competition_for(topics.len()))
            .with_sentiment(sentiment(&words))
            .with_topics(topics)
            .with_hashtags(hashtags)
            .with_content_types(content_types)
            .with_platforms(platforms)
            .with_peak_times(peak)
    }
}

/// More topics in one request means a more crowded space
pub fn competition_for(topic_count: usize) -> CompetitionLevel {
    match topic_count {
        0..=1 => CompetitionLevel::Low,
        2..=3 => CompetitionLevel::Medium,
        _ => CompetitionLevel::High,
    }
}

/// `(positive - negative) / (positive + negative)`, or 0 when neither occurs.
pub fn sentiment(words: &[String]) -> f64 {
    let positive = words
        .iter()
        .filter(|w| POSITIVE_WORDS.contains(&w.as_str()))
        .count();
    let negative = words
        .iter()
        .filter(|w| NEGATIVE_WORDS.contains(&w.as_str()))
        .count();

    if positive + negative == 0 {
        return 0.0;
    }
    (positive as f64 - negative as f64) / (positive + negative) as f64
}

/// Lowercased alphanumeric words
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn lookup(lexicon: &[(&str, &'static str)], word: &str) -> Option<&'static str> {
    lexicon
        .iter()
        .find(|(keyword, _)| *keyword == word)
        .map(|(_, value)| *value)
}

fn collect_unique(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}
