//! Entity and quantity extraction from normalized utterance text.
//!
//! Extraction never fails: an entity that cannot be found is simply absent
//! from the bundle, and downstream handlers turn that absence into a
//! clarifying question instead of guessing.

use crate::catalog::CatalogSnapshot;
use crate::domain::ProductRecord;
use crate::fuzzy::FuzzyMatcher;

/// Everything the extractor could pull out of one utterance.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EntityBundle {
    /// Best catalog match for the isolated product span, at or above the
    /// acceptance threshold.
    pub product: Option<ProductMatch>,
    /// The isolated product span itself, kept even when nothing resolved so
    /// the recommendation engine can run its own matching over it.
    pub query_span: Option<String>,
    /// Defaults to 1 when absent or non-positive.
    pub quantity: u32,
    pub budget_ceiling: Option<f64>,
    pub coupon_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductMatch {
    pub record: ProductRecord,
    pub score: u8,
}

/// Filler vocabulary stripped when isolating the product span.
const STOP_WORDS: &[&str] = &[
    "add", "put", "to", "my", "the", "a", "an", "cart", "basket", "from", "remove", "delete",
    "take", "out", "please", "i", "want", "need", "buy", "me", "show", "get", "for", "some", "of",
    "in", "and", "is", "what", "whats", "recommend", "suggest", "friendly", "alternative",
    "compare", "vs", "versus", "rank", "with", "you", "can", "could", "would", "like", "do",
    "have", "about", "info", "tell",
];

const BUDGET_TRIGGERS: &[&str] = &["under", "below", "within"];
const COUPON_TRIGGERS: &[&str] = &["coupon", "code", "apply"];

#[derive(Clone, Debug)]
pub struct EntityExtractor {
    matcher: FuzzyMatcher,
}

impl EntityExtractor {
    pub fn new(matcher: FuzzyMatcher) -> Self {
        Self { matcher }
    }

    /// Extracts an [`EntityBundle`] from already-normalized text against the
    /// current snapshot.
    pub fn extract(&self, normalized_text: &str, snapshot: &CatalogSnapshot) -> EntityBundle {
        let tokens: Vec<&str> = normalized_text.split_whitespace().collect();
        let mut consumed = vec![false; tokens.len()];

        let budget_ceiling = extract_budget(&tokens, &mut consumed);
        let coupon_code = extract_coupon(&tokens, &mut consumed);
        let quantity = extract_quantity(&tokens, &mut consumed);

        let span_tokens: Vec<&str> = tokens
            .iter()
            .enumerate()
            .filter(|(index, token)| !consumed[*index] && !STOP_WORDS.contains(token))
            .map(|(_, token)| *token)
            .collect();
        let query_span =
            if span_tokens.is_empty() { None } else { Some(span_tokens.join(" ")) };

        let product = query_span.as_deref().and_then(|span| {
            self.matcher.best(span, snapshot.names()).map(|matched| ProductMatch {
                record: snapshot.records[matched.index].clone(),
                score: matched.score,
            })
        });

        EntityBundle { product, query_span, quantity, budget_ceiling, coupon_code }
    }
}

fn extract_quantity(tokens: &[&str], consumed: &mut [bool]) -> u32 {
    for (index, token) in tokens.iter().enumerate() {
        if consumed[index] {
            continue;
        }
        let Ok(value) = token.parse::<u32>() else { continue };
        // Only a positive count adjacent to a noun phrase counts as a
        // quantity; stray numbers (prices, order ids) are left alone.
        let followed_by_word = tokens
            .get(index + 1)
            .is_some_and(|next| next.chars().next().is_some_and(char::is_alphabetic));
        if value > 0 && followed_by_word {
            consumed[index] = true;
            return value;
        }
    }
    1
}

fn extract_budget(tokens: &[&str], consumed: &mut [bool]) -> Option<f64> {
    for (index, token) in tokens.iter().enumerate() {
        let amount_index = if BUDGET_TRIGGERS.contains(token) {
            index + 1
        } else if *token == "less" && tokens.get(index + 1) == Some(&"than") {
            consumed[index + 1] = true;
            index + 2
        } else {
            continue;
        };

        if let Some(amount) = tokens.get(amount_index).and_then(|raw| parse_money(raw)) {
            consumed[index] = true;
            consumed[amount_index] = true;
            return Some(amount);
        }
    }
    None
}

fn extract_coupon(tokens: &[&str], consumed: &mut [bool]) -> Option<String> {
    for (index, token) in tokens.iter().enumerate() {
        if !COUPON_TRIGGERS.contains(token) {
            continue;
        }
        if let Some(candidate) = tokens.get(index + 1) {
            if looks_like_coupon_code(candidate) {
                consumed[index] = true;
                consumed[index + 1] = true;
                return Some(candidate.to_uppercase());
            }
        }
    }
    None
}

/// A plausible coupon token: short, alphanumeric, mixing letters and digits.
pub fn looks_like_coupon_code(token: &str) -> bool {
    let len = token.chars().count();
    (4..=12).contains(&len)
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().any(|c| c.is_ascii_digit())
}

/// Parses `₹500`, `$25.50`, `500`, or `2k` into a positive amount.
fn parse_money(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start_matches(['₹', '$']).trim_end_matches(',');
    if trimmed.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(prefix) = trimmed.strip_suffix('k') {
        (prefix, 1_000.0)
    } else {
        (trimmed, 1.0)
    };

    let amount = number.parse::<f64>().ok()? * multiplier;
    (amount > 0.0).then_some(amount)
}
