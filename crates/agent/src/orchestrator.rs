//! Per-request dialogue pipeline: normalize, classify, extract, act, reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use greencart_backend::{CatalogProvider, CommerceApi};
use greencart_core::{
    load_bundled, AppConfig, CoreError, EntityExtractor, FuzzyMatcher, IntentClassifier,
    RecommendationEngine, Utterance,
};

use crate::pending::PendingStore;

pub const ANONYMOUS_USER: &str = "guest_user";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Clarify,
    Error,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Clarify => "clarify",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub status: ReplyStatus,
    /// Stable reason code, present only when `status` is not `success`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn success(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), status: ReplyStatus::Success, error: None }
    }

    pub fn clarify(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), status: ReplyStatus::Clarify, error: None }
    }

    pub fn from_error(error: &CoreError) -> Self {
        let status = if error.is_clarification() { ReplyStatus::Clarify } else { ReplyStatus::Error };
        Self {
            reply: error.user_reply().to_string(),
            status,
            error: Some(error.reason_code().to_string()),
        }
    }
}

/// What a handler produced: a completed action or a question that leaves the
/// turn with the user.
pub(crate) enum Outcome {
    Done(String),
    NeedsInput(String),
}

pub struct Orchestrator {
    pub(crate) backend: Arc<dyn CommerceApi>,
    pub(crate) catalog: CatalogProvider,
    pub(crate) classifier: IntentClassifier,
    pub(crate) extractor: EntityExtractor,
    pub(crate) engine: RecommendationEngine,
    pub(crate) matcher: FuzzyMatcher,
    pub(crate) coupon_codes: Vec<String>,
    pub(crate) pending: PendingStore,
    pub(crate) tip_cursor: Mutex<HashMap<String, usize>>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn CommerceApi>, config: &AppConfig) -> Self {
        let bundled = load_bundled(config.catalog.bundled_path.as_deref());
        let catalog =
            CatalogProvider::new(backend.clone(), bundled, config.catalog.freshness_secs);
        let matcher = FuzzyMatcher::new(config.matching.fuzzy_threshold);

        Self {
            backend,
            catalog,
            classifier: IntentClassifier::new(),
            extractor: EntityExtractor::new(matcher),
            engine: RecommendationEngine::new(matcher, config.matching.top_n),
            matcher,
            coupon_codes: config.dialogue.coupon_codes.clone(),
            pending: PendingStore::new(config.dialogue.pending_expiry_secs),
            tip_cursor: Mutex::new(HashMap::new()),
        }
    }

    /// Provenance of the most recent catalog fetch, for health reporting.
    pub async fn catalog_provenance(&self) -> Option<greencart_core::Provenance> {
        self.catalog.last_provenance().await
    }

    /// One full turn. Never panics and never propagates an error: every
    /// failure becomes a structured response. The caller-supplied
    /// correlation id ties this turn's events to the surrounding request.
    pub async fn handle(&self, request: ChatRequest, correlation_id: &str) -> ChatResponse {
        if request.text.trim().is_empty() {
            return ChatResponse::from_error(&CoreError::MalformedRequest(
                "message text is empty".to_string(),
            ));
        }

        let user_id = if request.user_id.trim().is_empty() {
            ANONYMOUS_USER.to_string()
        } else {
            request.user_id
        };
        let utterance = Utterance::new(request.text, user_id, request.auth_token);

        let snapshot = self.catalog.fetch(utterance.auth_token()).await;
        let pending = self.pending.get(utterance.user_id());
        let classification = self.classifier.classify(&utterance, pending.as_ref());

        info!(
            event_name = "chat.classified",
            correlation_id,
            user_id = utterance.user_id(),
            intent = classification.intent.as_str(),
            matched_rule = classification.matched_rule,
            confidence = classification.confidence,
            catalog_source = snapshot.provenance.as_str(),
            "classified utterance"
        );

        // Issuing an unrelated command abandons the outstanding flow.
        if pending.is_some() && !classification.from_pending() {
            self.pending.clear(utterance.user_id());
        }

        match self.dispatch(&utterance, &classification, &snapshot, pending).await {
            Ok(Outcome::Done(reply)) => ChatResponse::success(reply),
            Ok(Outcome::NeedsInput(reply)) => ChatResponse::clarify(reply),
            Err(error) => {
                warn!(
                    event_name = "chat.turn_failed",
                    correlation_id,
                    user_id = utterance.user_id(),
                    intent = classification.intent.as_str(),
                    reason = error.reason_code(),
                    "turn ended in failure"
                );
                ChatResponse::from_error(&error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use greencart_core::CoreError;

    use super::{ChatResponse, ReplyStatus};

    #[test]
    fn clarifying_errors_keep_the_error_code() {
        let response = ChatResponse::from_error(&CoreError::ExtractionAmbiguous);
        assert_eq!(response.status, ReplyStatus::Clarify);
        assert_eq!(response.error.as_deref(), Some("extraction_ambiguous"));
    }

    #[test]
    fn hard_failures_surface_as_error_status() {
        let response =
            ChatResponse::from_error(&CoreError::BackendActionFailed("boom".to_string()));
        assert_eq!(response.status, ReplyStatus::Error);
        assert_eq!(response.error.as_deref(), Some("backend_action_failed"));
    }
}
