//! Keyword topic classifier
//!
//! An annotation only: the label is written to the page log and never
//! affects what gets crawled.

const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "technology",
        &["technology", "tech", "computer", "software", "hardware", "ai", "machine learning", "cloud"],
    ),
    ("news", &["breaking", "journal", "report", "newsroom", "headline", "press"]),
    ("sports", &["score", "match", "team", "player", "goal", "tournament", "scoreboard"]),
    (
        "finance",
        &["stock", "market", "finance", "investment", "bank", "trader", "cryptocurrency", "crypto"],
    ),
    ("health", &["health", "medical", "doctor", "hospital", "disease", "wellness"]),
    (
        "entertainment",
        &["movie", "music", "concert", "film", "celebrity", "tv show", "series"],
    ),
];

/// Returns the topic with the most keyword hits, or "" when nothing matches
///
/// Keywords match as substrings of the lowercased text. Ties go to the topic
/// declared first.
pub fn classify_topic(text: &str) -> &'static str {
    if text.is_empty() {
        return "";
    }
    let lowered = text.to_lowercase();

    let mut best = ("", 0);
    for (topic, keywords) in TOPIC_KEYWORDS {
        let score = keywords.iter().filter(|kw| lowered.contains(**kw)).count();
        if score > best.1 {
            best = (*topic, score);
        }
    }
    best.0
}
