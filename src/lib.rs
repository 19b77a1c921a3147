pub mod core;

use std::path::Path;

pub use crate::core::advisories::{refresh_kev_catalog, AdvisoryError, AdvisoryReport, KEV_CATALOG_URL};
pub use crate::core::classify::ThreatLevel;
pub use crate::core::config::{FetchHeaders, IngestConfig};
pub use crate::core::feed::fetcher::{build_client, FetchError};
pub use crate::core::ingest::{
    run_ingestion, run_ingestion_with_deadline, IngestError, IngestReport, SourceReport,
};
pub use crate::core::registry::{import_sources, parse_import, seed_default_sources, ImportError};
pub use crate::core::storage::{ArticleQuery, ArticleStore, MemoryStore, SqliteStore, StorageError};

/// Which persistence backend a process runs against, resolved once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChoice {
    Sqlite(String),
    Memory,
}

#[derive(Debug, thiserror::Error)]
#[error(
    "no database configured: set THREATFEED_DATABASE_URL (or DATABASE_URL) to a sqlite URL, \
     or to the literal value 'memory' for the ephemeral development store"
)]
pub struct StoreConfigError;

impl StoreChoice {
    /// Resolves the backend from the environment. The absence of any setting
    /// is fatal: a run must not start without an explicit decision about
    /// where articles go.
    pub fn from_env() -> Result<Self, StoreConfigError> {
        let configured = std::env::var("THREATFEED_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok();
        Self::from_setting(configured.as_deref())
    }

    fn from_setting(value: Option<&str>) -> Result<Self, StoreConfigError> {
        let trimmed = value.unwrap_or("").trim();
        if trimmed.is_empty() {
            return Err(StoreConfigError);
        }
        if trimmed.eq_ignore_ascii_case("memory") {
            return Ok(StoreChoice::Memory);
        }
        Ok(StoreChoice::Sqlite(trimmed.to_string()))
    }
}

/// Connection URL for a file-backed database, creating the file on first use.
pub fn to_sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::models::NewSource;

    #[test]
    fn store_choice_requires_an_explicit_setting() {
        assert!(StoreChoice::from_setting(None).is_err());
        assert!(StoreChoice::from_setting(Some("")).is_err());
        assert!(StoreChoice::from_setting(Some("   ")).is_err());
    }

    #[test]
    fn memory_literal_selects_the_ephemeral_store() {
        assert_eq!(
            StoreChoice::from_setting(Some("memory")).expect("memory should resolve"),
            StoreChoice::Memory
        );
        assert_eq!(
            StoreChoice::from_setting(Some(" MEMORY ")).expect("memory should resolve"),
            StoreChoice::Memory
        );
    }

    #[test]
    fn anything_else_is_treated_as_a_sqlite_url() {
        assert_eq!(
            StoreChoice::from_setting(Some("sqlite::memory:")).expect("url should resolve"),
            StoreChoice::Sqlite("sqlite::memory:".to_string())
        );
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_connections() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let url = to_sqlite_url(&dir.path().join("threatfeed.db"));

        {
            let store = SqliteStore::connect(&url)
                .await
                .expect("first connect should create the file");
            store
                .insert_source(&NewSource {
                    name: "Persistent Feed".to_string(),
                    url: "https://persist.example.com/rss".to_string(),
                    icon: None,
                    color: None,
                    is_active: true,
                })
                .await
                .expect("insert should succeed");
        }

        let reopened = SqliteStore::connect(&url)
            .await
            .expect("second connect should reuse the file");
        let sources = reopened.list_sources().await.expect("list should succeed");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Persistent Feed");
    }
}
