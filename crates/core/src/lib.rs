pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod fuzzy;
pub mod intent;
pub mod recommend;

pub use catalog::{load_bundled, CatalogSnapshot, Provenance};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{normalize, PendingAction, PendingSlot, ProductId, ProductRecord, Utterance};
pub use errors::CoreError;
pub use extract::{looks_like_coupon_code, EntityBundle, EntityExtractor, ProductMatch};
pub use fuzzy::{FuzzyMatcher, RankedMatch, DEFAULT_THRESHOLD};
pub use intent::{Classification, Intent, IntentClassifier};
pub use recommend::{ComparisonOutcome, RecommendationEngine, DEFAULT_TOP_N};
