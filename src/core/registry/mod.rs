use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::storage::models::NewSource;
use super::storage::repository::{ArticleStore, StorageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub new_sources: Vec<NewSource>,
    pub duplicate_sources: Vec<NewSource>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid OPML content: {0}")]
    Opml(String),
    #[error("invalid JSON source list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported import format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum JsonImportItem {
    Url(String),
    Object {
        url: String,
        name: Option<String>,
        icon: Option<String>,
        color: Option<String>,
    },
}

/// The curated starter set every fresh deployment begins with.
pub fn default_sources() -> Vec<NewSource> {
    let seeds = [
        (
            "Bleeping Computer",
            "https://www.bleepingcomputer.com/feed/",
            "fas fa-exclamation",
            "#ef4444",
        ),
        (
            "The Hacker News",
            "https://feeds.feedburner.com/TheHackersNews",
            "fas fa-user-secret",
            "#f97316",
        ),
        (
            "Dark Reading",
            "https://www.darkreading.com/rss.xml",
            "fas fa-eye",
            "#8b5cf6",
        ),
        (
            "CrowdStrike Blog",
            "https://www.crowdstrike.com/blog/feed/",
            "fas fa-crow",
            "#dc2626",
        ),
        (
            "Unit 42",
            "https://unit42.paloaltonetworks.com/feed/",
            "fas fa-shield-virus",
            "#2563eb",
        ),
        (
            "The DFIR Report",
            "https://thedfirreport.com/feed/",
            "fas fa-search",
            "#16a34a",
        ),
        (
            "Krebs on Security",
            "https://krebsonsecurity.com/feed/",
            "fas fa-user-tie",
            "#059669",
        ),
        (
            "Microsoft Security Blog",
            "https://www.microsoft.com/en-us/security/blog/feed/",
            "fas fa-microsoft",
            "#00bcf2",
        ),
    ];
    seeds
        .into_iter()
        .map(|(name, url, icon, color)| NewSource {
            name: name.to_string(),
            url: url.to_string(),
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
            is_active: true,
        })
        .collect()
}

/// Inserts any default source not present yet. Safe to call on every start.
pub async fn seed_default_sources<S: ArticleStore>(store: &S) -> Result<usize, StorageError> {
    let existing: HashSet<String> = store
        .list_sources()
        .await?
        .into_iter()
        .map(|source| normalize_url(&source.url))
        .collect();

    let mut inserted = 0_usize;
    for source in default_sources() {
        if existing.contains(&normalize_url(&source.url)) {
            continue;
        }
        store.insert_source(&source).await?;
        inserted += 1;
    }
    if inserted > 0 {
        info!(inserted, "seeded default feed sources");
    }
    Ok(inserted)
}

pub fn parse_opml(opml_content: &str) -> Result<Vec<NewSource>, ImportError> {
    let doc = roxmltree::Document::parse(opml_content)
        .map_err(|error| ImportError::Opml(error.to_string()))?;
    let mut results = Vec::new();

    for node in doc.descendants().filter(|node| node.has_tag_name("outline")) {
        let Some(url) = node.attribute("xmlUrl") else {
            continue;
        };
        if url.trim().is_empty() {
            continue;
        }

        let name = node
            .attribute("title")
            .or_else(|| node.attribute("text"))
            .unwrap_or(url)
            .to_string();
        results.push(NewSource {
            name,
            url: url.to_string(),
            icon: None,
            color: None,
            is_active: true,
        });
    }

    Ok(results)
}

pub fn parse_url_list(input: &str) -> Vec<NewSource> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(|line| NewSource {
            name: line.to_string(),
            url: line.to_string(),
            icon: None,
            color: None,
            is_active: true,
        })
        .collect()
}

pub fn parse_json_sources(input: &str) -> Result<Vec<NewSource>, ImportError> {
    let items: Vec<JsonImportItem> = serde_json::from_str(input)?;
    let mut sources = Vec::with_capacity(items.len());

    for item in items {
        match item {
            JsonImportItem::Url(url) => {
                sources.push(NewSource {
                    name: url.clone(),
                    url,
                    icon: None,
                    color: None,
                    is_active: true,
                });
            }
            JsonImportItem::Object {
                url,
                name,
                icon,
                color,
            } => {
                sources.push(NewSource {
                    name: name.unwrap_or_else(|| url.clone()),
                    url,
                    icon,
                    color,
                    is_active: true,
                });
            }
        }
    }

    Ok(sources)
}

pub fn parse_import(format: &str, content: &str) -> Result<Vec<NewSource>, ImportError> {
    match format.to_lowercase().as_str() {
        "opml" | "xml" => parse_opml(content),
        "url_list" | "urls" | "txt" => Ok(parse_url_list(content)),
        "json" | "json_list" => parse_json_sources(content),
        unsupported => Err(ImportError::UnsupportedFormat(unsupported.to_string())),
    }
}

/// Splits candidates into ones worth inserting and ones already known,
/// comparing normalized URLs against the registry and within the batch.
pub fn build_import_preview(
    candidates: Vec<NewSource>,
    existing_urls: &HashSet<String>,
) -> ImportPreview {
    let mut seen = HashMap::<String, NewSource>::new();
    let mut duplicate_sources = Vec::new();
    let mut new_sources = Vec::new();

    for source in candidates {
        let normalized = normalize_url(&source.url);
        if normalized.is_empty() {
            continue;
        }

        if existing_urls.contains(&normalized) {
            duplicate_sources.push(source);
            continue;
        }

        if let Some(existing) = seen.insert(normalized, source.clone()) {
            duplicate_sources.push(existing);
            duplicate_sources.push(source);
            continue;
        }

        new_sources.push(source);
    }

    ImportPreview {
        new_sources,
        duplicate_sources,
    }
}

/// Previews against the store's current registry and inserts only the new
/// candidates. Returns how many landed.
pub async fn import_sources<S: ArticleStore>(
    store: &S,
    candidates: Vec<NewSource>,
) -> Result<usize, StorageError> {
    let existing: HashSet<String> = store
        .list_sources()
        .await?
        .into_iter()
        .map(|source| normalize_url(&source.url))
        .collect();
    let preview = build_import_preview(candidates, &existing);

    let mut inserted = 0_usize;
    for source in &preview.new_sources {
        store.insert_source(source).await?;
        inserted += 1;
    }
    info!(
        inserted,
        skipped = preview.duplicate_sources.len(),
        "imported feed sources"
    );
    Ok(inserted)
}

pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}
