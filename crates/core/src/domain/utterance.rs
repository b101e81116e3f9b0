/// One inbound user message, immutable once created. The auth token is an
/// opaque pass-through for the backend and is never inspected here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
    raw: String,
    normalized: String,
    user_id: String,
    auth_token: Option<String>,
}

impl Utterance {
    pub fn new(
        raw: impl Into<String>,
        user_id: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self { raw, normalized, user_id: user_id.into(), auth_token }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.normalized.split_whitespace()
    }
}

/// Lower-cases and strips punctuation, collapsing runs of whitespace.
/// Currency symbols and `%` survive because the extractor reads them.
pub fn normalize(text: &str) -> String {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.to_lowercase().chars() {
        if character.is_alphanumeric() || matches!(character, '$' | '₹' | '%' | '.') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{normalize, Utterance};

    #[test]
    fn normalization_lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Add 2 Bamboo-Bottles, please!"), "add 2 bamboo bottles please");
    }

    #[test]
    fn normalization_keeps_currency_symbols() {
        assert_eq!(normalize("under ₹500"), "under ₹500");
        assert_eq!(normalize("below $25.50"), "below $25.50");
    }

    #[test]
    fn utterance_exposes_both_forms() {
        let utterance = Utterance::new("Show my CART!", "user-1", None);
        assert_eq!(utterance.raw(), "Show my CART!");
        assert_eq!(utterance.normalized(), "show my cart");
        assert_eq!(utterance.user_id(), "user-1");
        assert!(utterance.auth_token().is_none());
    }
}
