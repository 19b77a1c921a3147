pub mod report;

pub use report::{IngestReport, SourceReport};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::core::classify::{estimate_read_time, extract_tags, threat_level};
use crate::core::config::IngestConfig;
use crate::core::feed::fetcher::{build_client, fetch_feed_with_retry, FetchError};
use crate::core::feed::parser::parse_feed;
use crate::core::feed::types::FeedItem;
use crate::core::storage::models::{canonical_timestamp, NewArticle, SourceRecord};
use crate::core::storage::repository::{ArticleStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("http client error: {0}")]
    Client(#[from] FetchError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("ingestion run exceeded its {0:?} deadline")]
    Deadline(std::time::Duration),
}

/// One full ingestion pass: expire old articles, then visit every active
/// source in registration order. Per-source failures are folded into that
/// source's report slice and never abort the run; only run-level storage
/// faults and client construction propagate.
///
/// The returned future is cancel safe at its await points;
/// [`run_ingestion_with_deadline`] builds on that for callers with a hard
/// time budget.
pub async fn run_ingestion<S: ArticleStore>(
    store: &S,
    config: &IngestConfig,
) -> Result<IngestReport, IngestError> {
    let client = build_client(config)?;

    let cutoff = canonical_timestamp(Utc::now() - Duration::days(config.retention_days));
    let expired = store.delete_articles_before(&cutoff).await?;
    if expired > 0 {
        info!(expired, %cutoff, "removed articles past retention");
    }

    let sources = store.list_active_sources().await?;
    info!(sources = sources.len(), "starting ingestion run");

    let mut total_fetched = 0_usize;
    let mut source_results = Vec::with_capacity(sources.len());
    for source in &sources {
        let result = process_source(store, &client, config, source).await;
        total_fetched += result.items_processed;
        if result.errors.is_empty() {
            debug!(source = %result.name, processed = result.items_processed, "source done");
        } else {
            warn!(
                source = %result.name,
                processed = result.items_processed,
                errors = result.errors.len(),
                "source finished with errors"
            );
        }
        source_results.push(result);
    }

    info!(total_fetched, "ingestion run complete");
    Ok(IngestReport {
        message: format!("Successfully fetched {total_fetched} new articles"),
        total_fetched,
        source_results,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// [`run_ingestion`] bounded by a whole-run deadline for callers on a
/// schedule. The run future is dropped when the deadline fires, so articles
/// stored before that moment stay stored and the next run picks up the rest.
pub async fn run_ingestion_with_deadline<S: ArticleStore>(
    store: &S,
    config: &IngestConfig,
    deadline: std::time::Duration,
) -> Result<IngestReport, IngestError> {
    match tokio::time::timeout(deadline, run_ingestion(store, config)).await {
        Ok(result) => result,
        Err(_) => Err(IngestError::Deadline(deadline)),
    }
}

async fn process_source<S: ArticleStore>(
    store: &S,
    client: &reqwest::Client,
    config: &IngestConfig,
    source: &SourceRecord,
) -> SourceReport {
    let mut report = SourceReport {
        name: source.name.clone(),
        url: source.url.clone(),
        ..SourceReport::default()
    };

    let body = match fetch_feed_with_retry(
        client,
        &source.url,
        config.max_retries,
        config.backoff_unit,
    )
    .await
    {
        Ok(body) => body,
        Err(err) => {
            report.errors.push(err.to_string());
            if let Err(store_err) = store.record_source_failure(source.id).await {
                report.errors.push(store_err.to_string());
            }
            return report;
        }
    };

    // The endpoint answered, so the fetch timestamp advances even if the
    // payload turns out to be unparseable.
    let fetched_at = canonical_timestamp(Utc::now());
    if let Err(err) = store.mark_source_fetched(source.id, &fetched_at).await {
        report.errors.push(err.to_string());
    }

    let feed = match parse_feed(&body) {
        Ok(feed) => feed,
        Err(err) => {
            report.errors.push(err.to_string());
            if let Err(store_err) = store.record_source_failure(source.id).await {
                report.errors.push(store_err.to_string());
            }
            return report;
        }
    };

    report.items_found = feed.items_found();
    for item in feed.items(config.max_items_per_source) {
        match store.article_url_exists(&item.link).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(err) => {
                report.errors.push(err.to_string());
                continue;
            }
        }
        match store.insert_article(&build_article(config, source, &item)).await {
            Ok(_) => report.items_processed += 1,
            Err(err) => report.errors.push(format!("Insert failed: {err}")),
        }
    }

    // Fetch and parse both worked, so the source itself is healthy again,
    // whatever happened to individual items.
    if let Err(err) = store.clear_source_failures(source.id).await {
        report.errors.push(err.to_string());
    }

    report
}

fn build_article(config: &IngestConfig, source: &SourceRecord, item: &FeedItem) -> NewArticle {
    let snippet = item.snippet();
    NewArticle {
        source_id: source.id,
        source_name: source.name.clone(),
        source_icon: source.icon.clone(),
        title: item.title.clone(),
        summary: derive_summary(item, &snippet, config.summary_limit),
        url: item.link.clone(),
        published_at: canonical_timestamp(item.published_at.unwrap_or_else(Utc::now)),
        threat_level: threat_level(&item.title, &snippet),
        tags: extract_tags(&item.title, &snippet),
        read_time_minutes: estimate_read_time(&item.reading_text()),
    }
}

/// The snippet wins when the feed provided one; otherwise the full content is
/// cut at the configured limit with an ellipsis marker.
fn derive_summary(item: &FeedItem, snippet: &str, limit: usize) -> Option<String> {
    if !snippet.is_empty() {
        return Some(snippet.to_string());
    }
    let content = item.reading_text();
    if content.is_empty() {
        return None;
    }
    let mut summary: String = content.chars().take(limit).collect();
    if content.chars().count() > limit {
        summary.push_str("...");
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::memory::MemoryStore;
    use crate::core::storage::models::{ArticleRecord, BookmarkRecord, KevAdvisory, NewSource};
    use crate::core::storage::repository::ArticleQuery;
    use axum::extract::State;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration as StdDuration;

    fn test_config() -> IngestConfig {
        IngestConfig {
            request_timeout: StdDuration::from_secs(2),
            backoff_unit: StdDuration::from_millis(5),
            ..IngestConfig::default()
        }
    }

    fn rss_feed(items: &[(&str, &str, &str)]) -> String {
        let mut body = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rss version=\"2.0\"><channel><title>Test Feed</title>",
        );
        for (title, link, description) in items {
            body.push_str(&format!(
                "<item><title>{title}</title><link>{link}</link>\
                 <description>{description}</description></item>"
            ));
        }
        body.push_str("</channel></rss>");
        body
    }

    async fn body_handler(State(body): State<String>) -> String {
        body
    }

    async fn serve_body(body: String) -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/feed.xml", get(body_handler))
            .with_state(body);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}/feed.xml"), handle)
    }

    async fn dead_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        drop(listener);
        format!("http://{address}/feed.xml")
    }

    async fn register(store: &impl ArticleStore, name: &str, url: &str) -> SourceRecord {
        store
            .insert_source(&NewSource {
                name: name.to_string(),
                url: url.to_string(),
                icon: Some("fas fa-shield-virus".to_string()),
                color: Some("#2563eb".to_string()),
                is_active: true,
            })
            .await
            .expect("source should register")
    }

    #[tokio::test]
    async fn unreachable_source_does_not_poison_the_run() {
        let store = MemoryStore::default();
        let good_body = rss_feed(&[
            (
                "Critical zero-day exploited",
                "https://good.example.com/posts/1",
                "Attackers chain a zero-day with ransomware payloads.",
            ),
            (
                "Vendor ships vulnerability fix",
                "https://good.example.com/posts/2",
                "Routine monthly patches.",
            ),
            (
                "Weekly roundup",
                "https://good.example.com/posts/3",
                "Conference season recap.",
            ),
        ]);
        let (good_url, server) = serve_body(good_body).await;
        let dead_url = dead_endpoint().await;

        register(&store, "Good Feed", &good_url).await;
        register(&store, "Dead Feed", &dead_url).await;

        let report = run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        assert_eq!(report.total_fetched, 3);
        assert_eq!(report.message, "Successfully fetched 3 new articles");
        assert_eq!(report.source_results.len(), 2);

        let good = &report.source_results[0];
        assert_eq!(good.name, "Good Feed");
        assert_eq!(good.items_found, 3);
        assert_eq!(good.items_processed, 3);
        assert!(good.errors.is_empty());

        let dead = &report.source_results[1];
        assert_eq!(dead.name, "Dead Feed");
        assert_eq!(dead.items_found, 0);
        assert_eq!(dead.items_processed, 0);
        assert!(!dead.errors.is_empty());

        // Only the reachable source advances its fetch timestamp; the dead
        // one accrues a failure instead.
        let sources = store.list_sources().await.expect("list sources");
        assert!(sources[0].last_fetched_at.is_some());
        assert_eq!(sources[0].failure_count, 0);
        assert!(sources[1].last_fetched_at.is_none());
        assert_eq!(sources[1].failure_count, 1);

        server.abort();
    }

    #[tokio::test]
    async fn second_run_stores_nothing_new() {
        let store = MemoryStore::default();
        let body = rss_feed(&[
            ("One", "https://repeat.example.com/posts/1", "d"),
            ("Two", "https://repeat.example.com/posts/2", "d"),
        ]);
        let (url, server) = serve_body(body).await;
        register(&store, "Repeat Feed", &url).await;

        let first = run_ingestion(&store, &test_config())
            .await
            .expect("first run");
        let second = run_ingestion(&store, &test_config())
            .await
            .expect("second run");

        assert_eq!(first.total_fetched, 2);
        assert_eq!(second.total_fetched, 0);
        assert_eq!(second.source_results[0].items_found, 2);
        assert_eq!(second.source_results[0].items_processed, 0);
        assert!(second.source_results[0].errors.is_empty());
        assert_eq!(store.count_articles().await.expect("count"), 2);

        server.abort();
    }

    #[tokio::test]
    async fn entry_cap_limits_processing_not_discovery() {
        let store = MemoryStore::default();
        let items: Vec<(String, String, String)> = (0..12)
            .map(|index| {
                (
                    format!("Entry {index}"),
                    format!("https://capped.example.com/posts/{index}"),
                    "d".to_string(),
                )
            })
            .collect();
        let borrowed: Vec<(&str, &str, &str)> = items
            .iter()
            .map(|(title, link, description)| {
                (title.as_str(), link.as_str(), description.as_str())
            })
            .collect();
        let (url, server) = serve_body(rss_feed(&borrowed)).await;
        register(&store, "Capped Feed", &url).await;

        let report = run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        assert_eq!(report.source_results[0].items_found, 12);
        assert_eq!(report.source_results[0].items_processed, 10);
        assert_eq!(store.count_articles().await.expect("count"), 10);

        server.abort();
    }

    #[tokio::test]
    async fn unparseable_payload_still_advances_fetch_timestamp() {
        let store = MemoryStore::default();
        let (url, server) = serve_body("<!DOCTYPE html><html>not a feed</html>".to_string()).await;
        register(&store, "Html Feed", &url).await;

        let report = run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        assert_eq!(report.total_fetched, 0);
        assert!(!report.source_results[0].errors.is_empty());
        let sources = store.list_sources().await.expect("list sources");
        assert!(sources[0].last_fetched_at.is_some());
        assert_eq!(sources[0].failure_count, 1);

        server.abort();
    }

    #[tokio::test]
    async fn run_sweeps_expired_articles_and_their_bookmarks() {
        let store = MemoryStore::default();
        let (url, server) = serve_body(rss_feed(&[(
            "Fresh entry",
            "https://sweep.example.com/posts/fresh",
            "d",
        )]))
        .await;
        let source = register(&store, "Sweep Feed", &url).await;

        let stale = store
            .insert_article(&NewArticle {
                source_id: source.id,
                source_name: source.name.clone(),
                source_icon: None,
                title: "Old news".to_string(),
                summary: None,
                url: "https://sweep.example.com/posts/ancient".to_string(),
                published_at: canonical_timestamp(Utc::now() - Duration::days(45)),
                threat_level: crate::core::classify::ThreatLevel::Medium,
                tags: Vec::new(),
                read_time_minutes: 1,
            })
            .await
            .expect("stale insert");
        store.add_bookmark(stale.id, 1).await.expect("bookmark");

        let report = run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        assert_eq!(report.total_fetched, 1);
        let remaining = store
            .list_articles(&ArticleQuery::default())
            .await
            .expect("list articles");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "https://sweep.example.com/posts/fresh");
        assert!(store.list_bookmarks(1).await.expect("bookmarks").is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn stored_articles_carry_classification_and_summary() {
        let store = MemoryStore::default();
        let body = rss_feed(&[(
            "Critical zero-day in VPN appliances",
            "https://classify.example.com/posts/vpn",
            "&lt;p&gt;Exploit activity observed against windows and linux fleets.&lt;/p&gt;",
        )]);
        let (url, server) = serve_body(body).await;
        register(&store, "Classify Feed", &url).await;

        run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        let articles = store
            .list_articles(&ArticleQuery::default())
            .await
            .expect("list articles");
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.threat_level, "CRITICAL");
        assert_eq!(article.tag_list(), vec!["Zero-day", "Exploit", "Windows"]);
        assert_eq!(
            article.summary.as_deref(),
            Some("Exploit activity observed against windows and linux fleets.")
        );
        assert_eq!(article.read_time_minutes, 1);
        assert_eq!(article.source_name, "Classify Feed");
        assert!(!article.published_at.is_empty());

        server.abort();
    }

    struct PoisonedStore {
        inner: MemoryStore,
    }

    impl ArticleStore for PoisonedStore {
        async fn list_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
            self.inner.list_sources().await
        }
        async fn list_active_sources(&self) -> Result<Vec<SourceRecord>, StorageError> {
            self.inner.list_active_sources().await
        }
        async fn insert_source(&self, source: &NewSource) -> Result<SourceRecord, StorageError> {
            self.inner.insert_source(source).await
        }
        async fn source_url_exists(&self, url: &str) -> Result<bool, StorageError> {
            self.inner.source_url_exists(url).await
        }
        async fn set_source_active(
            &self,
            source_id: i64,
            is_active: bool,
        ) -> Result<u64, StorageError> {
            self.inner.set_source_active(source_id, is_active).await
        }
        async fn mark_source_fetched(
            &self,
            source_id: i64,
            fetched_at: &str,
        ) -> Result<(), StorageError> {
            self.inner.mark_source_fetched(source_id, fetched_at).await
        }
        async fn record_source_failure(&self, source_id: i64) -> Result<(), StorageError> {
            self.inner.record_source_failure(source_id).await
        }
        async fn clear_source_failures(&self, source_id: i64) -> Result<(), StorageError> {
            self.inner.clear_source_failures(source_id).await
        }
        async fn article_url_exists(&self, url: &str) -> Result<bool, StorageError> {
            self.inner.article_url_exists(url).await
        }
        async fn insert_article(
            &self,
            article: &NewArticle,
        ) -> Result<ArticleRecord, StorageError> {
            if article.url.contains("poison") {
                return Err(StorageError::Conflict("disk I/O error".to_string()));
            }
            self.inner.insert_article(article).await
        }
        async fn list_articles(
            &self,
            query: &ArticleQuery,
        ) -> Result<Vec<ArticleRecord>, StorageError> {
            self.inner.list_articles(query).await
        }
        async fn count_articles(&self) -> Result<i64, StorageError> {
            self.inner.count_articles().await
        }
        async fn delete_articles_before(&self, cutoff: &str) -> Result<u64, StorageError> {
            self.inner.delete_articles_before(cutoff).await
        }
        async fn add_bookmark(
            &self,
            article_id: i64,
            user_id: i64,
        ) -> Result<BookmarkRecord, StorageError> {
            self.inner.add_bookmark(article_id, user_id).await
        }
        async fn remove_bookmark(
            &self,
            article_id: i64,
            user_id: i64,
        ) -> Result<bool, StorageError> {
            self.inner.remove_bookmark(article_id, user_id).await
        }
        async fn list_bookmarks(&self, user_id: i64) -> Result<Vec<BookmarkRecord>, StorageError> {
            self.inner.list_bookmarks(user_id).await
        }
        async fn upsert_kev_advisories(
            &self,
            advisories: &[KevAdvisory],
        ) -> Result<usize, StorageError> {
            self.inner.upsert_kev_advisories(advisories).await
        }
        async fn count_kev_advisories(&self) -> Result<i64, StorageError> {
            self.inner.count_kev_advisories().await
        }
    }

    #[tokio::test]
    async fn deadline_cuts_the_run_but_keeps_stored_articles() {
        let store = MemoryStore::default();
        let (fast_url, fast_server) = serve_body(rss_feed(&[(
            "Quick entry",
            "https://fast.example.com/posts/1",
            "d",
        )]))
        .await;
        let slow_app = Router::new().route(
            "/feed.xml",
            get(|| async {
                tokio::time::sleep(StdDuration::from_secs(10)).await;
                "<rss/>"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let slow_server = tokio::spawn(async move {
            axum::serve(listener, slow_app)
                .await
                .expect("server should run");
        });

        register(&store, "Fast Feed", &fast_url).await;
        register(&store, "Slow Feed", &format!("http://{address}/feed.xml")).await;

        let err =
            run_ingestion_with_deadline(&store, &test_config(), StdDuration::from_millis(500))
                .await
                .expect_err("hanging source should trip the deadline");

        // The fast source finished before the cutoff; its article stays.
        assert!(matches!(err, IngestError::Deadline(_)));
        assert_eq!(store.count_articles().await.expect("count"), 1);

        fast_server.abort();
        slow_server.abort();
    }

    #[tokio::test]
    async fn insert_failure_is_reported_and_skipped() {
        let store = PoisonedStore {
            inner: MemoryStore::default(),
        };
        let body = rss_feed(&[
            ("First", "https://mixed.example.com/posts/1", "d"),
            ("Cursed", "https://mixed.example.com/posts/poison", "d"),
            ("Third", "https://mixed.example.com/posts/3", "d"),
        ]);
        let (url, server) = serve_body(body).await;
        register(&store, "Mixed Feed", &url).await;

        let report = run_ingestion(&store, &test_config())
            .await
            .expect("run should complete");

        let result = &report.source_results[0];
        assert_eq!(result.items_found, 3);
        // The poisoned middle item fails, the other two still land.
        assert_eq!(result.items_processed, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Insert failed:"));
        assert_eq!(report.total_fetched, 2);

        server.abort();
    }
}
