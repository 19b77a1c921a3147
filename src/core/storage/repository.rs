use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::models::{ArticleRecord, BookmarkRecord, KevAdvisory, NewArticle, NewSource, SourceRecord};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub source_id: Option<i64>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

/// Persistence seam for the ingestion pipeline. The coordinator is generic
/// over this trait, so runs behave identically against SQLite and the
/// in-memory development store.
///
/// `insert_article` must reject a URL that is already stored; that unique
/// constraint is the dedup backstop behind the coordinator's existence check.
#[allow(async_fn_in_trait)]
pub trait ArticleStore {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>, StorageError>;
    async fn list_active_sources(&self) -> Result<Vec<SourceRecord>, StorageError>;
    async fn insert_source(&self, source: &NewSource) -> Result<SourceRecord, StorageError>;
    async fn source_url_exists(&self, url: &str) -> Result<bool, StorageError>;
    async fn set_source_active(&self, source_id: i64, is_active: bool)
        -> Result<u64, StorageError>;
    async fn mark_source_fetched(&self, source_id: i64, fetched_at: &str)
        -> Result<(), StorageError>;
    async fn record_source_failure(&self, source_id: i64) -> Result<(), StorageError>;
    async fn clear_source_failures(&self, source_id: i64) -> Result<(), StorageError>;

    async fn article_url_exists(&self, url: &str) -> Result<bool, StorageError>;
    async fn insert_article(&self, article: &NewArticle) -> Result<ArticleRecord, StorageError>;
    async fn list_articles(&self, query: &ArticleQuery) -> Result<Vec<ArticleRecord>, StorageError>;
    async fn count_articles(&self) -> Result<i64, StorageError>;
    /// Removes articles published before `cutoff` and, through the schema's
    /// cascade, their bookmarks. Returns the number of articles removed.
    async fn delete_articles_before(&self, cutoff: &str) -> Result<u64, StorageError>;

    async fn add_bookmark(&self, article_id: i64, user_id: i64)
        -> Result<BookmarkRecord, StorageError>;
    async fn remove_bookmark(&self, article_id: i64, user_id: i64) -> Result<bool, StorageError>;
    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkRecord>, StorageError>;

    async fn upsert_kev_advisories(&self, advisories: &[KevAdvisory])
        -> Result<usize, StorageError>;
    async fn count_kev_advisories(&self) -> Result<i64, StorageError>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ArticleStore for SqliteStore {
    async fn list_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
        let rows = sqlx::query_as::<_, SourceRecord>(
            r#"
            SELECT id, name, url, icon, color, is_active, last_fetched_at, failure_count, created_at
            FROM sources
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_active_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
        let rows = sqlx::query_as::<_, SourceRecord>(
            r#"
            SELECT id, name, url, icon, color, is_active, last_fetched_at, failure_count, created_at
            FROM sources
            WHERE is_active = 1
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_source(&self, source: &NewSource) -> Result<SourceRecord, StorageError> {
        sqlx::query(
            r#"
            INSERT INTO sources (name, url, icon, color, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&source.name)
        .bind(&source.url)
        .bind(&source.icon)
        .bind(&source.color)
        .bind(i64::from(source.is_active))
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, SourceRecord>(
            r#"
            SELECT id, name, url, icon, color, is_active, last_fetched_at, failure_count, created_at
            FROM sources
            WHERE url = ?1
            "#,
        )
        .bind(&source.url)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn source_url_exists(&self, url: &str) -> Result<bool, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sources WHERE url = ?1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn set_source_active(
        &self,
        source_id: i64,
        is_active: bool,
    ) -> Result<u64, StorageError> {
        let affected = sqlx::query("UPDATE sources SET is_active = ?1 WHERE id = ?2")
            .bind(i64::from(is_active))
            .bind(source_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn mark_source_fetched(
        &self,
        source_id: i64,
        fetched_at: &str,
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE sources SET last_fetched_at = ?1 WHERE id = ?2")
            .bind(fetched_at)
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_source_failure(&self, source_id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE sources SET failure_count = failure_count + 1 WHERE id = ?1")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_source_failures(&self, source_id: i64) -> Result<(), StorageError> {
        sqlx::query("UPDATE sources SET failure_count = 0 WHERE id = ?1")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn article_url_exists(&self, url: &str) -> Result<bool, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE url = ?1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<ArticleRecord, StorageError> {
        let tags = serde_json::to_string(&article.tags)?;
        sqlx::query(
            r#"
            INSERT INTO articles (source_id, source_name, source_icon, title, summary, url,
                                  published_at, threat_level, tags, read_time_minutes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(article.source_id)
        .bind(&article.source_name)
        .bind(&article.source_icon)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.url)
        .bind(&article.published_at)
        .bind(article.threat_level.as_str())
        .bind(&tags)
        .bind(i64::from(article.read_time_minutes))
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, ArticleRecord>(
            r#"
            SELECT id, source_id, source_name, source_icon, title, summary, url,
                   published_at, threat_level, tags, read_time_minutes, created_at
            FROM articles
            WHERE url = ?1
            "#,
        )
        .bind(&article.url)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn list_articles(
        &self,
        query: &ArticleQuery,
    ) -> Result<Vec<ArticleRecord>, StorageError> {
        let keyword = query.search.as_deref().unwrap_or("").trim().to_string();
        let rows = sqlx::query_as::<_, ArticleRecord>(
            r#"
            SELECT id, source_id, source_name, source_icon, title, summary, url,
                   published_at, threat_level, tags, read_time_minutes, created_at
            FROM articles
            WHERE (?1 IS NULL OR source_id = ?1)
              AND (?2 = '' OR title LIKE '%' || ?2 || '%' OR IFNULL(summary, '') LIKE '%' || ?2 || '%')
            ORDER BY published_at DESC
            LIMIT ?3
            "#,
        )
        .bind(query.source_id)
        .bind(keyword)
        .bind(query.limit.unwrap_or(50))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_articles(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_articles_before(&self, cutoff: &str) -> Result<u64, StorageError> {
        let affected = sqlx::query("DELETE FROM articles WHERE published_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn add_bookmark(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> Result<BookmarkRecord, StorageError> {
        sqlx::query("INSERT INTO bookmarks (article_id, user_id) VALUES (?1, ?2)")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let record = sqlx::query_as::<_, BookmarkRecord>(
            r#"
            SELECT id, article_id, user_id, created_at
            FROM bookmarks
            WHERE article_id = ?1 AND user_id = ?2
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn remove_bookmark(&self, article_id: i64, user_id: i64) -> Result<bool, StorageError> {
        let affected = sqlx::query("DELETE FROM bookmarks WHERE article_id = ?1 AND user_id = ?2")
            .bind(article_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkRecord>, StorageError> {
        let rows = sqlx::query_as::<_, BookmarkRecord>(
            r#"
            SELECT id, article_id, user_id, created_at
            FROM bookmarks
            WHERE user_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_kev_advisories(
        &self,
        advisories: &[KevAdvisory],
    ) -> Result<usize, StorageError> {
        let mut written = 0_usize;
        for advisory in advisories {
            sqlx::query(
                r#"
                INSERT INTO kev_advisories (cve_id, vendor_project, product, vulnerability_name,
                                            date_added, short_description, required_action,
                                            due_date, known_ransomware_use)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(cve_id) DO UPDATE SET
                  vendor_project = excluded.vendor_project,
                  product = excluded.product,
                  vulnerability_name = excluded.vulnerability_name,
                  date_added = excluded.date_added,
                  short_description = excluded.short_description,
                  required_action = excluded.required_action,
                  due_date = excluded.due_date,
                  known_ransomware_use = excluded.known_ransomware_use,
                  updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&advisory.cve_id)
            .bind(&advisory.vendor_project)
            .bind(&advisory.product)
            .bind(&advisory.vulnerability_name)
            .bind(&advisory.date_added)
            .bind(&advisory.short_description)
            .bind(&advisory.required_action)
            .bind(&advisory.due_date)
            .bind(&advisory.known_ransomware_use)
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    async fn count_kev_advisories(&self) -> Result<i64, StorageError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kev_advisories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
