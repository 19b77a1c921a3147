use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::classify::ThreatLevel;

/// Single format for every timestamp this crate writes. Stored values stay
/// lexicographically comparable, which the retention sweep relies on.
pub fn canonical_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub is_active: i64,
    pub last_fetched_at: Option<String>,
    pub failure_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    pub source_id: i64,
    pub source_name: String,
    pub source_icon: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: String,
    pub threat_level: ThreatLevel,
    pub tags: Vec<String>,
    pub read_time_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArticleRecord {
    pub id: i64,
    pub source_id: i64,
    pub source_name: String,
    pub source_icon: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: String,
    pub threat_level: String,
    /// JSON array text, exactly as stored.
    pub tags: String,
    pub read_time_minutes: i64,
    pub created_at: String,
}

impl ArticleRecord {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.tags).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookmarkRecord {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KevAdvisory {
    pub cve_id: String,
    pub vendor_project: String,
    pub product: String,
    pub vulnerability_name: String,
    pub date_added: String,
    pub short_description: String,
    pub required_action: Option<String>,
    pub due_date: Option<String>,
    pub known_ransomware_use: Option<String>,
}
