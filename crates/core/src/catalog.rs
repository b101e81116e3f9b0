//! Catalog snapshot types and the bundled last-resort dataset.
//!
//! The bundled CSV ships inside the binary so the assistant can still talk
//! about products when every other source is unreachable. It is loaded once
//! and treated as immutable reference data.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ProductId, ProductRecord};

const EMBEDDED_PRODUCTS: &str = include_str!("../data/products.csv");

/// Which source satisfied a catalog fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Live,
    Cached,
    Bundled,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cached => "cached",
            Self::Bundled => "bundled",
        }
    }
}

/// An ordered sequence of products plus where they came from and when.
/// Created per request (or reused within a freshness window) and discarded
/// after use.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogSnapshot {
    pub records: Vec<ProductRecord>,
    pub provenance: Provenance,
    pub fetched_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn new(records: Vec<ProductRecord>, provenance: Provenance, now: DateTime<Utc>) -> Self {
        Self { records, provenance, fetched_at: now }
    }

    pub fn empty(provenance: Provenance, now: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), provenance, now)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ProductRecord> {
        self.records.iter().find(|record| record.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Deserialize)]
struct BundledRow {
    id: i64,
    name: String,
    price: f64,
    carbon_footprint: f64,
    eco_points: i32,
    category: String,
    available: bool,
}

impl From<BundledRow> for ProductRecord {
    fn from(row: BundledRow) -> Self {
        Self {
            id: ProductId(row.id),
            name: row.name,
            price: row.price,
            carbon_footprint: row.carbon_footprint.max(0.0),
            eco_points: row.eco_points,
            category: row.category,
            available: row.available,
        }
    }
}

/// Loads the bundled dataset, disk-first with the embedded copy as fallback.
/// Never fails: unreadable files fall back, malformed rows are skipped with
/// a warning.
pub fn load_bundled(path: Option<&Path>) -> Vec<ProductRecord> {
    let from_disk = path.and_then(|p| std::fs::read_to_string(p).ok());
    let raw = from_disk.as_deref().unwrap_or(EMBEDDED_PRODUCTS);
    parse_bundled(raw)
}

fn parse_bundled(raw: &str) -> Vec<ProductRecord> {
    let mut reader = csv::Reader::from_reader(raw.as_bytes());
    let mut records = Vec::new();
    for row in reader.deserialize::<BundledRow>() {
        match row {
            Ok(row) => records.push(ProductRecord::from(row)),
            Err(error) => {
                warn!(
                    event_name = "catalog.bundled.bad_row",
                    error = %error,
                    "skipping malformed bundled dataset row"
                );
            }
        }
    }
    records
}
