use serde::{Deserialize, Serialize};

const CRITICAL_KEYWORDS: [&str; 3] = ["critical", "zero-day", "ransomware"];
const HIGH_KEYWORDS: [&str; 3] = ["high", "vulnerability", "exploit"];

/// Tag vocabulary, matched and emitted in this order.
const TAG_VOCABULARY: [&str; 19] = [
    "malware",
    "ransomware",
    "phishing",
    "zero-day",
    "vulnerability",
    "exploit",
    "apt",
    "microsoft",
    "google",
    "apple",
    "android",
    "ios",
    "windows",
    "linux",
    "cloud",
    "aws",
    "azure",
    "kubernetes",
    "docker",
];

pub const MAX_TAGS: usize = 3;
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Critical,
    High,
    Medium,
    /// Reserved for curated downgrades; feed classification never emits it.
    Low,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Critical => "CRITICAL",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::Low => "LOW",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword triage over the title and snippet. Critical keywords win over
/// high ones regardless of position; anything else lands at medium.
pub fn threat_level(title: &str, snippet: &str) -> ThreatLevel {
    let text = format!("{title} {snippet}").to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        ThreatLevel::Critical
    } else if HIGH_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        ThreatLevel::High
    } else {
        ThreatLevel::Medium
    }
}

/// Vocabulary terms found in the title or snippet, capitalized, in
/// vocabulary order, capped at [`MAX_TAGS`].
pub fn extract_tags(title: &str, snippet: &str) -> Vec<String> {
    let text = format!("{title} {snippet}").to_lowercase();
    TAG_VOCABULARY
        .iter()
        .filter(|tag| text.contains(*tag))
        .take(MAX_TAGS)
        .map(|tag| capitalize(tag))
        .collect()
}

/// Whole minutes at 200 words per minute, never below one.
pub fn estimate_read_time(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
