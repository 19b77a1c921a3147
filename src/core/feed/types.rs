use chrono::{DateTime, Utc};
use html2text::render::TrivialDecorator;

/// One entry exactly as the feed carried it, before validity filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// An entry that carries both a title and a link.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

impl ParsedFeed {
    /// Raw entry count before the cap and the title/link filter, which is
    /// what run reports surface as items found.
    pub fn items_found(&self) -> usize {
        self.entries.len()
    }

    /// The first `cap` entries in feed order, keeping only the usable ones.
    /// Entries missing a title or a link are dropped silently and still count
    /// toward the cap.
    pub fn items(&self, cap: usize) -> impl Iterator<Item = FeedItem> + '_ {
        self.entries.iter().take(cap).filter_map(FeedEntry::to_item)
    }
}

impl FeedEntry {
    fn to_item(&self) -> Option<FeedItem> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())?;
        let link = self
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())?;
        Some(FeedItem {
            title: title.to_string(),
            link: link.to_string(),
            summary: self.summary.clone(),
            content: self.content.clone(),
            published_at: self.published_at,
        })
    }
}

impl FeedItem {
    /// Plain-text rendering of the summary, the field most feeds use for a
    /// short description.
    pub fn snippet(&self) -> String {
        self.summary
            .as_deref()
            .map(render_plain_text)
            .unwrap_or_default()
    }

    /// The richest text available for word counting: the snippet when the
    /// feed provided one, otherwise the full content.
    pub fn reading_text(&self) -> String {
        let snippet = self.snippet();
        if !snippet.is_empty() {
            return snippet;
        }
        self.content
            .as_deref()
            .map(render_plain_text)
            .unwrap_or_default()
    }
}

/// Strips markup and collapses whitespace so downstream consumers never see
/// HTML fragments in summaries or classifier input. The trivial decorator
/// keeps link text but drops URLs and emphasis markers.
pub(crate) fn render_plain_text(html: &str) -> String {
    let rendered =
        html2text::from_read_with_decorator(html.as_bytes(), 200, TrivialDecorator::new())
            .unwrap_or_default();
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}
