use crate::MAX_EMERGENCY_REASON_CHARS;

pub const DEFAULT_EMERGENCY_KEYWORDS: [&str; 5] = [
    "accident",
    "chest pain",
    "unconscious",
    "bleeding",
    "stroke",
];

/// Decides whether a free-text emergency reason looks like a genuine emergency.
pub trait EmergencyClassifier: Send + Sync {
    fn is_verified(&self, reason: &str) -> bool;
}

/// Case-insensitive substring match against a fixed keyword list.
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EMERGENCY_KEYWORDS)
    }
}

impl EmergencyClassifier for KeywordClassifier {
    fn is_verified(&self, reason: &str) -> bool {
        let text = reason.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

pub fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_EMERGENCY_REASON_CHARS).collect()
}
