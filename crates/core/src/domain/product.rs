use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

/// A catalog entry as served by any source. Read-only once inside a
/// snapshot; the core never mutates catalog data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    pub carbon_footprint: f64,
    pub eco_points: i32,
    pub category: String,
    pub available: bool,
}
