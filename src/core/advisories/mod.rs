use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::storage::models::KevAdvisory;
use super::storage::repository::{ArticleStore, StorageError};

/// CISA's Known Exploited Vulnerabilities catalog.
pub const KEV_CATALOG_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevCatalog {
    pub catalog_version: String,
    pub date_released: String,
    pub count: usize,
    pub vulnerabilities: Vec<KevCatalogItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevCatalogItem {
    #[serde(rename = "cveID")]
    pub cve_id: String,
    pub vendor_project: String,
    pub product: String,
    pub vulnerability_name: String,
    pub date_added: String,
    pub short_description: String,
    #[serde(default)]
    pub required_action: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub known_ransomware_campaign_use: Option<String>,
}

impl From<KevCatalogItem> for KevAdvisory {
    fn from(item: KevCatalogItem) -> Self {
        KevAdvisory {
            cve_id: item.cve_id,
            vendor_project: item.vendor_project,
            product: item.product,
            vulnerability_name: item.vulnerability_name,
            date_added: item.date_added,
            short_description: item.short_description,
            required_action: item.required_action,
            due_date: item.due_date,
            known_ransomware_use: item.known_ransomware_campaign_use,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryReport {
    pub processed: usize,
    pub catalog_total: usize,
    pub catalog_version: String,
    pub timestamp: String,
}

/// Downloads the KEV catalog and upserts every advisory keyed by CVE id, so
/// repeat refreshes update rather than duplicate.
pub async fn refresh_kev_catalog<S: ArticleStore>(
    store: &S,
    client: &reqwest::Client,
    catalog_url: &str,
) -> Result<AdvisoryReport, AdvisoryError> {
    let response = client.get(catalog_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdvisoryError::HttpStatus(status.as_u16()));
    }

    let catalog: KevCatalog = response.json().await?;
    let catalog_total = catalog.count;
    let catalog_version = catalog.catalog_version.clone();
    info!(
        advisories = catalog.vulnerabilities.len(),
        version = %catalog_version,
        "fetched KEV catalog"
    );

    let advisories: Vec<KevAdvisory> = catalog
        .vulnerabilities
        .into_iter()
        .map(KevAdvisory::from)
        .collect();
    let processed = store.upsert_kev_advisories(&advisories).await?;

    Ok(AdvisoryReport {
        processed,
        catalog_total,
        catalog_version,
        timestamp: Utc::now().to_rfc3339(),
    })
}
