//! Catalog acquisition with a live -> cached -> bundled fallback chain.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use greencart_core::{CatalogSnapshot, ProductRecord, Provenance};

use crate::client::CommerceApi;

/// Produces a usable [`CatalogSnapshot`] for every request. A fresh cached
/// snapshot is reused as-is; otherwise one live fetch is attempted and the
/// bundled dataset covers total backend loss. The chain never fails, though
/// the worst case is an empty bundled snapshot.
pub struct CatalogProvider {
    backend: Arc<dyn CommerceApi>,
    bundled: Vec<ProductRecord>,
    freshness: Duration,
    cache: Mutex<Option<CatalogSnapshot>>,
}

impl CatalogProvider {
    pub fn new(
        backend: Arc<dyn CommerceApi>,
        bundled: Vec<ProductRecord>,
        freshness_secs: u64,
    ) -> Self {
        Self {
            backend,
            bundled,
            freshness: Duration::seconds(freshness_secs.min(i64::MAX as u64) as i64),
            cache: Mutex::new(None),
        }
    }

    pub async fn fetch(&self, auth: Option<&str>) -> CatalogSnapshot {
        let now = Utc::now();
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if now - cached.fetched_at <= self.freshness {
                let mut snapshot = cached.clone();
                snapshot.provenance = Provenance::Cached;
                info!(
                    event_name = "catalog.fetch",
                    source = snapshot.provenance.as_str(),
                    products = snapshot.records.len(),
                    "reusing catalog snapshot within freshness window"
                );
                return snapshot;
            }
        }

        match self.backend.search_products("", auth).await {
            Ok(records) if !records.is_empty() => {
                let snapshot = CatalogSnapshot::new(records, Provenance::Live, now);
                info!(
                    event_name = "catalog.fetch",
                    source = snapshot.provenance.as_str(),
                    products = snapshot.records.len(),
                    "fetched live catalog"
                );
                *cache = Some(snapshot.clone());
                snapshot
            }
            Ok(_) => {
                warn!(
                    event_name = "catalog.fetch",
                    source = "bundled",
                    "live catalog was empty, serving bundled dataset"
                );
                CatalogSnapshot::new(self.bundled.clone(), Provenance::Bundled, now)
            }
            Err(error) => {
                warn!(
                    event_name = "catalog.fetch",
                    source = "bundled",
                    error = %error,
                    "live catalog fetch failed, serving bundled dataset"
                );
                CatalogSnapshot::new(self.bundled.clone(), Provenance::Bundled, now)
            }
        }
    }

    /// Provenance the next fetch would report, for health reporting.
    pub async fn last_provenance(&self) -> Option<Provenance> {
        self.cache.lock().await.as_ref().map(|snapshot| snapshot.provenance)
    }
}
