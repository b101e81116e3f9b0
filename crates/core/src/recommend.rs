//! Eco-impact ranking and head-to-head comparison over a catalog snapshot.

use crate::catalog::CatalogSnapshot;
use crate::domain::ProductRecord;
use crate::fuzzy::FuzzyMatcher;

pub const DEFAULT_TOP_N: usize = 3;

/// Outcome of a two-product comparison. Either name can fail to resolve
/// independently; partial data is never compared.
#[derive(Clone, Debug, PartialEq)]
pub enum ComparisonOutcome {
    Winner {
        winner: ProductRecord,
        loser: ProductRecord,
        /// Percentage the winner undercuts the loser's carbon footprint,
        /// rounded to one decimal.
        percent_less_carbon: f64,
    },
    Unresolved {
        /// The names that could not be identified, in query order.
        unmatched: Vec<String>,
    },
}

#[derive(Clone, Debug)]
pub struct RecommendationEngine {
    matcher: FuzzyMatcher,
    top_n: usize,
}

impl RecommendationEngine {
    pub fn new(matcher: FuzzyMatcher, top_n: usize) -> Self {
        Self { matcher, top_n }
    }

    /// Candidates matching `query_terms` (or `category_hint` when no name
    /// matches), inside the budget ceiling, best eco-impact first.
    ///
    /// An empty result is meaningful: the caller distinguishes "nothing
    /// matched" from "matched but filtered out" via the snapshot itself.
    pub fn recommend(
        &self,
        query_terms: &str,
        budget_ceiling: Option<f64>,
        category_hint: Option<&str>,
        snapshot: &CatalogSnapshot,
    ) -> Vec<ProductRecord> {
        let mut candidates: Vec<&ProductRecord> = if query_terms.trim().is_empty() {
            Vec::new()
        } else {
            snapshot
                .records
                .iter()
                .filter(|record| {
                    self.matcher.score(query_terms, &record.name) >= self.matcher.threshold()
                })
                .collect()
        };

        // Fall back to the category hint only when no name match exists.
        if candidates.is_empty() {
            if let Some(hint) = category_hint {
                candidates = snapshot
                    .records
                    .iter()
                    .filter(|record| {
                        self.matcher.score(hint, &record.category) >= self.matcher.threshold()
                    })
                    .collect();
            } else if query_terms.trim().is_empty() {
                // Rank-the-catalog mode: no query, no hint.
                candidates = snapshot.records.iter().collect();
            }
        }

        let mut results: Vec<ProductRecord> = candidates
            .into_iter()
            .filter(|record| record.available)
            .filter(|record| budget_ceiling.map_or(true, |ceiling| record.price <= ceiling))
            .cloned()
            .collect();

        results.sort_by(|a, b| {
            a.carbon_footprint
                .total_cmp(&b.carbon_footprint)
                .then(b.eco_points.cmp(&a.eco_points))
                .then(a.price.total_cmp(&b.price))
        });
        results.truncate(self.top_n);
        results
    }

    /// Resolves each name independently and declares the lower-carbon record
    /// the winner.
    pub fn compare(
        &self,
        name_a: &str,
        name_b: &str,
        snapshot: &CatalogSnapshot,
    ) -> ComparisonOutcome {
        let resolve = |name: &str| {
            self.matcher
                .best(name, snapshot.names())
                .map(|matched| snapshot.records[matched.index].clone())
        };

        let first = resolve(name_a);
        let second = resolve(name_b);

        match (first, second) {
            (Some(a), Some(b)) => {
                let (winner, loser) = if a.carbon_footprint <= b.carbon_footprint {
                    (a, b)
                } else {
                    (b, a)
                };
                let higher = loser.carbon_footprint;
                let percent = if higher > 0.0 {
                    round_one_decimal((higher - winner.carbon_footprint) / higher * 100.0)
                } else {
                    0.0
                };
                ComparisonOutcome::Winner { winner, loser, percent_less_carbon: percent }
            }
            (first, second) => {
                let mut unmatched = Vec::new();
                if first.is_none() {
                    unmatched.push(name_a.to_string());
                }
                if second.is_none() {
                    unmatched.push(name_b.to_string());
                }
                ComparisonOutcome::Unresolved { unmatched }
            }
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
