use thiserror::Error;

/// Failures the dialogue pipeline can surface to a user.
///
/// Every variant carries a stable reason code for logs and a reply the
/// assistant can say verbatim. Handlers propagate these instead of panicking;
/// the orchestrator decides whether a failure is a clarification or an error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("could not isolate a product from the utterance")]
    ExtractionAmbiguous,
    #[error("no catalog source produced any products")]
    CatalogUnavailable,
    #[error("backend action failed: {0}")]
    BackendActionFailed(String),
    #[error("no intent rule matched the utterance")]
    IntentUnresolved,
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl CoreError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ExtractionAmbiguous => "extraction_ambiguous",
            Self::CatalogUnavailable => "catalog_unavailable",
            Self::BackendActionFailed(_) => "backend_action_failed",
            Self::IntentUnresolved => "intent_unresolved",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }

    /// A reply safe to show the user, never exposing transport detail.
    pub fn user_reply(&self) -> &'static str {
        match self {
            Self::ExtractionAmbiguous => {
                "I couldn't tell which product you meant. Could you give me the product name?"
            }
            Self::CatalogUnavailable => {
                "I couldn't reach the product catalog right now. Please try again in a moment."
            }
            Self::BackendActionFailed(_) => {
                "Something went wrong while talking to the store. Please try that again."
            }
            Self::IntentUnresolved => {
                "I'm not sure what you'd like to do. You can ask me to recommend eco-friendly \
                 products, manage your cart, or track an order."
            }
            Self::MalformedRequest(_) => "I didn't receive any message text. What can I help with?",
        }
    }

    /// Whether the failure should read as a clarifying question rather than
    /// a hard error.
    pub fn is_clarification(&self) -> bool {
        matches!(
            self,
            Self::ExtractionAmbiguous | Self::IntentUnresolved | Self::MalformedRequest(_)
        )
    }
}
