use feed_rs::model::Entry;

use super::sanitizer::sanitize_xml;
use super::types::{FeedEntry, ParsedFeed};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("invalid character in entity name: {0}")]
    EntityName(String),
    #[error("attribute without value: {0}")]
    AttributeMissingValue(String),
    #[error("missing whitespace between attributes: {0}")]
    AttributeWhitespace(String),
    #[error("invalid attribute name: {0}")]
    AttributeName(String),
    #[error("not recognized as an RSS or Atom feed: {0}")]
    NotRecognized(String),
    #[error("malformed feed: {0}")]
    Malformed(String),
}

/// Runs the payload through [`sanitize_xml`] and hands the repaired text to
/// the feed parser. Parse failures are folded into a small taxonomy keyed on
/// the underlying parser message, so operators can tell a mangled entity from
/// a page that is simply not a feed.
pub fn parse_feed(raw: &str) -> Result<ParsedFeed, FeedParseError> {
    let cleaned = sanitize_xml(raw);
    let trimmed = cleaned.trim_start();
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }

    let feed = feed_rs::parser::parse(trimmed.as_bytes()).map_err(classify_parse_error)?;
    Ok(ParsedFeed {
        title: feed.title.map(|text| text.content),
        entries: feed.entries.iter().map(entry_fields).collect(),
    })
}

fn entry_fields(entry: &Entry) -> FeedEntry {
    FeedEntry {
        title: entry.title.as_ref().map(|text| text.content.clone()),
        link: entry.links.first().map(|link| link.href.clone()),
        summary: entry.summary.as_ref().map(|text| text.content.clone()),
        content: entry
            .content
            .as_ref()
            .and_then(|content| content.body.clone()),
        published_at: entry.published.or(entry.updated),
    }
}

fn classify_parse_error(err: feed_rs::parser::ParseFeedError) -> FeedParseError {
    let raw = err.to_string();
    let lowered = raw.to_lowercase();
    if lowered.contains("entity") {
        FeedParseError::EntityName(raw)
    } else if lowered.contains("attribute") && lowered.contains("value") {
        FeedParseError::AttributeMissingValue(raw)
    } else if lowered.contains("whitespace") {
        FeedParseError::AttributeWhitespace(raw)
    } else if lowered.contains("attribute") {
        FeedParseError::AttributeName(raw)
    } else if lowered.contains("root") || lowered.contains("unknown") || lowered.contains("unable")
    {
        FeedParseError::NotRecognized(raw)
    } else {
        FeedParseError::Malformed(raw)
    }
}
