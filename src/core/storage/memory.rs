use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::models::{
    canonical_timestamp, ArticleRecord, BookmarkRecord, KevAdvisory, NewArticle, NewSource,
    SourceRecord,
};
use super::repository::{ArticleQuery, ArticleStore, StorageError};

/// Ephemeral [`ArticleStore`] for development runs and tests. Mirrors the
/// SQLite store's contract, including the unique-URL rejection and the
/// bookmark cascade on retention deletes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_source_id: i64,
    next_article_id: i64,
    next_bookmark_id: i64,
    sources: Vec<SourceRecord>,
    articles: Vec<ArticleRecord>,
    bookmarks: Vec<BookmarkRecord>,
    kev: HashMap<String, KevAdvisory>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArticleStore for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
        Ok(self.lock().sources.clone())
    }

    async fn list_active_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
        Ok(self
            .lock()
            .sources
            .iter()
            .filter(|source| source.is_active == 1)
            .cloned()
            .collect())
    }

    async fn insert_source(&self, source: &NewSource) -> Result<SourceRecord, StorageError> {
        let mut inner = self.lock();
        if inner.sources.iter().any(|existing| existing.url == source.url) {
            return Err(StorageError::Conflict(format!(
                "UNIQUE constraint failed: sources.url: {}",
                source.url
            )));
        }
        inner.next_source_id += 1;
        let record = SourceRecord {
            id: inner.next_source_id,
            name: source.name.clone(),
            url: source.url.clone(),
            icon: source.icon.clone(),
            color: source.color.clone(),
            is_active: i64::from(source.is_active),
            last_fetched_at: None,
            failure_count: 0,
            created_at: canonical_timestamp(Utc::now()),
        };
        inner.sources.push(record.clone());
        Ok(record)
    }

    async fn source_url_exists(&self, url: &str) -> Result<bool, StorageError> {
        Ok(self.lock().sources.iter().any(|source| source.url == url))
    }

    async fn set_source_active(
        &self,
        source_id: i64,
        is_active: bool,
    ) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        match inner.sources.iter_mut().find(|source| source.id == source_id) {
            Some(source) => {
                source.is_active = i64::from(is_active);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn mark_source_fetched(
        &self,
        source_id: i64,
        fetched_at: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if let Some(source) = inner.sources.iter_mut().find(|source| source.id == source_id) {
            source.last_fetched_at = Some(fetched_at.to_string());
        }
        Ok(())
    }

    async fn record_source_failure(&self, source_id: i64) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if let Some(source) = inner.sources.iter_mut().find(|source| source.id == source_id) {
            source.failure_count += 1;
        }
        Ok(())
    }

    async fn clear_source_failures(&self, source_id: i64) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if let Some(source) = inner.sources.iter_mut().find(|source| source.id == source_id) {
            source.failure_count = 0;
        }
        Ok(())
    }

    async fn article_url_exists(&self, url: &str) -> Result<bool, StorageError> {
        Ok(self.lock().articles.iter().any(|article| article.url == url))
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<ArticleRecord, StorageError> {
        let tags = serde_json::to_string(&article.tags)?;
        let mut inner = self.lock();
        if inner.articles.iter().any(|existing| existing.url == article.url) {
            return Err(StorageError::Conflict(format!(
                "UNIQUE constraint failed: articles.url: {}",
                article.url
            )));
        }
        inner.next_article_id += 1;
        let record = ArticleRecord {
            id: inner.next_article_id,
            source_id: article.source_id,
            source_name: article.source_name.clone(),
            source_icon: article.source_icon.clone(),
            title: article.title.clone(),
            summary: article.summary.clone(),
            url: article.url.clone(),
            published_at: article.published_at.clone(),
            threat_level: article.threat_level.as_str().to_string(),
            tags,
            read_time_minutes: i64::from(article.read_time_minutes),
            created_at: canonical_timestamp(Utc::now()),
        };
        inner.articles.push(record.clone());
        Ok(record)
    }

    async fn list_articles(
        &self,
        query: &ArticleQuery,
    ) -> Result<Vec<ArticleRecord>, StorageError> {
        let keyword = query
            .search
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let limit = query.limit.unwrap_or(50).max(0) as usize;
        let mut rows: Vec<ArticleRecord> = self
            .lock()
            .articles
            .iter()
            .filter(|article| query.source_id.is_none_or(|id| article.source_id == id))
            .filter(|article| {
                keyword.is_empty()
                    || article.title.to_lowercase().contains(&keyword)
                    || article
                        .summary
                        .as_deref()
                        .unwrap_or("")
                        .to_lowercase()
                        .contains(&keyword)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn count_articles(&self) -> Result<i64, StorageError> {
        Ok(self.lock().articles.len() as i64)
    }

    async fn delete_articles_before(&self, cutoff: &str) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let removed_ids: Vec<i64> = inner
            .articles
            .iter()
            .filter(|article| article.published_at.as_str() < cutoff)
            .map(|article| article.id)
            .collect();
        inner
            .articles
            .retain(|article| !removed_ids.contains(&article.id));
        inner
            .bookmarks
            .retain(|bookmark| !removed_ids.contains(&bookmark.article_id));
        Ok(removed_ids.len() as u64)
    }

    async fn add_bookmark(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> Result<BookmarkRecord, StorageError> {
        let mut inner = self.lock();
        if !inner.articles.iter().any(|article| article.id == article_id) {
            return Err(StorageError::Conflict(format!(
                "FOREIGN KEY constraint failed: no article {article_id}"
            )));
        }
        if inner
            .bookmarks
            .iter()
            .any(|bookmark| bookmark.article_id == article_id && bookmark.user_id == user_id)
        {
            return Err(StorageError::Conflict(format!(
                "UNIQUE constraint failed: bookmarks.article_id: {article_id}"
            )));
        }
        inner.next_bookmark_id += 1;
        let record = BookmarkRecord {
            id: inner.next_bookmark_id,
            article_id,
            user_id,
            created_at: canonical_timestamp(Utc::now()),
        };
        inner.bookmarks.push(record.clone());
        Ok(record)
    }

    async fn remove_bookmark(&self, article_id: i64, user_id: i64) -> Result<bool, StorageError> {
        let mut inner = self.lock();
        let before = inner.bookmarks.len();
        inner
            .bookmarks
            .retain(|bookmark| !(bookmark.article_id == article_id && bookmark.user_id == user_id));
        Ok(inner.bookmarks.len() < before)
    }

    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkRecord>, StorageError> {
        let mut rows: Vec<BookmarkRecord> = self
            .lock()
            .bookmarks
            .iter()
            .filter(|bookmark| bookmark.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn upsert_kev_advisories(
        &self,
        advisories: &[KevAdvisory],
    ) -> Result<usize, StorageError> {
        let mut inner = self.lock();
        for advisory in advisories {
            inner
                .kev
                .insert(advisory.cve_id.clone(), advisory.clone());
        }
        Ok(advisories.len())
    }

    async fn count_kev_advisories(&self) -> Result<i64, StorageError> {
        Ok(self.lock().kev.len() as i64)
    }
}
