//! Rule-ordered intent classification.
//!
//! Rules are tagged objects evaluated by a single dispatch loop: tiers run
//! in order, the first satisfied tier wins, and within a tier the rule with
//! the longest matched keyword or phrase beats shorter overlaps. A user's
//! pending action takes priority over everything when the utterance matches
//! its expected response shape (a bare coupon code, a yes/no).

use serde::Serialize;

use crate::domain::{PendingAction, Utterance};
use crate::extract::looks_like_coupon_code;

/// The closed set of user goals this assistant understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CartAdd,
    CartRemove,
    CartShow,
    CartClear,
    Checkout,
    ApplyCoupon,
    ConfirmOrder,
    TrackOrder,
    CancelOrder,
    EcoRecommendation,
    EcoComparison,
    EcoInfo,
    EcoRank,
    CarbonImpact,
    Greeting,
    EcoTip,
    PaymentMethod,
    SmallTalk,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CartAdd => "cart_add",
            Self::CartRemove => "cart_remove",
            Self::CartShow => "cart_show",
            Self::CartClear => "cart_clear",
            Self::Checkout => "checkout",
            Self::ApplyCoupon => "apply_coupon",
            Self::ConfirmOrder => "confirm_order",
            Self::TrackOrder => "track_order",
            Self::CancelOrder => "cancel_order",
            Self::EcoRecommendation => "eco_recommendation",
            Self::EcoComparison => "eco_comparison",
            Self::EcoInfo => "eco_info",
            Self::EcoRank => "eco_rank",
            Self::CarbonImpact => "carbon_impact",
            Self::Greeting => "greeting",
            Self::EcoTip => "eco_tip",
            Self::PaymentMethod => "payment_method",
            Self::SmallTalk => "small_talk",
            Self::Unknown => "unknown",
        }
    }
}

/// Produced fresh per utterance; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    /// Match strength in [0, 100]; 0 means no rule matched.
    pub confidence: u8,
    pub matched_rule: &'static str,
}

impl Classification {
    fn new(intent: Intent, confidence: u8, matched_rule: &'static str) -> Self {
        Self { intent, confidence, matched_rule }
    }

    /// True when this classification came from a pending-action override.
    pub fn from_pending(&self) -> bool {
        self.matched_rule.starts_with("pending.")
    }
}

/// A rule's trigger condition over normalized text.
#[derive(Clone, Copy, Debug)]
enum Trigger {
    /// Every group must contribute at least one matching keyword.
    AllOf(&'static [&'static [&'static str]]),
    /// Any single keyword or phrase matches.
    AnyOf(&'static [&'static str]),
}

#[derive(Clone, Copy, Debug)]
struct Rule {
    id: &'static str,
    tier: u8,
    intent: Intent,
    trigger: Trigger,
}

/// Ordered rule table. Tier 1 carries the specific phrase patterns, tier 2
/// the generic keyword-only rules.
const RULES: &[Rule] = &[
    Rule {
        id: "cart.clear",
        tier: 1,
        intent: Intent::CartClear,
        trigger: Trigger::AllOf(&[&["clear", "empty"], &["cart", "basket"]]),
    },
    Rule {
        id: "cart.clear.phrase",
        tier: 1,
        intent: Intent::CartClear,
        trigger: Trigger::AnyOf(&["remove all", "remove everything"]),
    },
    Rule {
        id: "cart.remove",
        tier: 1,
        intent: Intent::CartRemove,
        trigger: Trigger::AllOf(&[&["remove", "delete", "drop"], &["cart", "basket"]]),
    },
    Rule {
        id: "cart.remove.phrase",
        tier: 1,
        intent: Intent::CartRemove,
        trigger: Trigger::AnyOf(&["take out"]),
    },
    Rule {
        id: "cart.add",
        tier: 1,
        intent: Intent::CartAdd,
        trigger: Trigger::AllOf(&[&["add", "put"], &["cart", "basket"]]),
    },
    Rule {
        id: "cart.show",
        tier: 1,
        intent: Intent::CartShow,
        trigger: Trigger::AllOf(&[
            &["show", "view", "see", "what", "whats", "many", "display"],
            &["cart", "basket"],
        ]),
    },
    Rule {
        id: "order.track",
        tier: 1,
        intent: Intent::TrackOrder,
        trigger: Trigger::AllOf(&[
            &["track", "status", "where"],
            &["order", "package", "parcel", "delivery"],
        ]),
    },
    Rule {
        id: "order.cancel",
        tier: 1,
        intent: Intent::CancelOrder,
        trigger: Trigger::AllOf(&[&["cancel", "abort"], &["order", "purchase"]]),
    },
    Rule {
        id: "eco.comparison",
        tier: 1,
        intent: Intent::EcoComparison,
        trigger: Trigger::AnyOf(&["compare", "vs", "versus", "difference between", "greener"]),
    },
    Rule {
        id: "eco.rank",
        tier: 1,
        intent: Intent::EcoRank,
        trigger: Trigger::AnyOf(&[
            "rank",
            "greenest",
            "lowest carbon",
            "most eco",
            "top eco",
            "best eco",
        ]),
    },
    Rule {
        id: "carbon.impact",
        tier: 1,
        intent: Intent::CarbonImpact,
        trigger: Trigger::AnyOf(&[
            "my carbon",
            "my footprint",
            "my impact",
            "carbon insights",
            "carbon saved",
        ]),
    },
    Rule {
        id: "eco.info",
        tier: 1,
        intent: Intent::EcoInfo,
        trigger: Trigger::AnyOf(&[
            "carbon footprint",
            "carbon emission",
            "eco score",
            "eco points",
            "footprint",
            "emission",
        ]),
    },
    Rule {
        id: "payment.method",
        tier: 1,
        intent: Intent::PaymentMethod,
        trigger: Trigger::AnyOf(&["upi", "cod", "net banking", "wallet"]),
    },
    Rule {
        id: "coupon.apply",
        tier: 1,
        intent: Intent::ApplyCoupon,
        trigger: Trigger::AnyOf(&["coupon", "promo code", "apply code"]),
    },
    Rule {
        id: "order.confirm",
        tier: 2,
        intent: Intent::ConfirmOrder,
        trigger: Trigger::AnyOf(&["confirm", "finalize", "finalise", "complete order"]),
    },
    Rule {
        id: "checkout",
        tier: 2,
        intent: Intent::Checkout,
        trigger: Trigger::AnyOf(&["checkout", "check out", "place order", "buy now", "purchase"]),
    },
    Rule {
        id: "eco.recommend",
        tier: 2,
        intent: Intent::EcoRecommendation,
        trigger: Trigger::AnyOf(&[
            "recommend",
            "suggest",
            "eco friendly",
            "sustainable",
            "alternative",
        ]),
    },
    Rule {
        id: "eco.tip",
        tier: 2,
        intent: Intent::EcoTip,
        trigger: Trigger::AnyOf(&["tip", "tips"]),
    },
    Rule {
        id: "greeting",
        tier: 2,
        intent: Intent::Greeting,
        trigger: Trigger::AnyOf(&[
            "hi",
            "hello",
            "hey",
            "good morning",
            "good afternoon",
            "good evening",
            "namaste",
        ]),
    },
    Rule {
        id: "small_talk",
        tier: 2,
        intent: Intent::SmallTalk,
        trigger: Trigger::AnyOf(&["thank", "thanks", "bye", "goodbye"]),
    },
];

const AFFIRMATIONS: &[&str] = &["yes", "yeah", "yep", "sure", "confirm", "ok", "okay"];
const NEGATIONS: &[&str] = &["no", "nope", "dont", "keep"];
const COUPON_SKIPS: &[&str] = &["skip", "no", "none", "nope"];

#[derive(Clone, Copy, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Pure function of (normalized text, pending action): no rule state is
    /// mutated by classification.
    pub fn classify(
        &self,
        utterance: &Utterance,
        pending: Option<&PendingAction>,
    ) -> Classification {
        let text = utterance.normalized();

        if let Some(classification) = classify_pending(text, pending) {
            return classification;
        }

        let mut tier_winner: Option<(usize, &Rule)> = None;
        let mut current_tier = 0u8;

        for rule in RULES {
            if tier_winner.is_some() && rule.tier > current_tier {
                break;
            }
            current_tier = rule.tier;

            let Some(strength) = trigger_strength(&rule.trigger, text) else { continue };
            let better = match tier_winner {
                Some((best_strength, _)) => strength > best_strength,
                None => true,
            };
            if better {
                tier_winner = Some((strength, rule));
            }
        }

        match tier_winner {
            Some((strength, rule)) => {
                let base = if rule.tier == 1 { 70 } else { 55 };
                let confidence = (base + strength.min(25) as u8).min(95);
                Classification::new(rule.intent, confidence, rule.id)
            }
            None => Classification::new(Intent::Unknown, 0, "unmatched"),
        }
    }
}

/// Pending-action override: a response whose shape matches the outstanding
/// slot wins over the generic rule table.
fn classify_pending(text: &str, pending: Option<&PendingAction>) -> Option<Classification> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match pending? {
        PendingAction::AwaitingCoupon { .. } => {
            if tokens.iter().any(|token| COUPON_SKIPS.contains(token)) {
                return Some(Classification::new(Intent::ApplyCoupon, 90, "pending.coupon.skip"));
            }
            if tokens.iter().any(|token| looks_like_coupon_code(token)) {
                return Some(Classification::new(Intent::ApplyCoupon, 95, "pending.coupon.code"));
            }
            None
        }
        PendingAction::AwaitingConfirmation { .. } => {
            if tokens.iter().any(|token| AFFIRMATIONS.contains(token)) {
                return Some(Classification::new(Intent::CancelOrder, 95, "pending.cancel.accept"));
            }
            if tokens.iter().any(|token| NEGATIONS.contains(token)) {
                return Some(Classification::new(Intent::CancelOrder, 90, "pending.cancel.decline"));
            }
            None
        }
    }
}

/// Match strength is the total length of the longest matched keyword per
/// group (or the longest matched phrase), so more specific phrasing beats
/// shorter overlapping keywords.
fn trigger_strength(trigger: &Trigger, text: &str) -> Option<usize> {
    match trigger {
        Trigger::AllOf(groups) => {
            let mut total = 0;
            for group in groups.iter() {
                let best = group
                    .iter()
                    .filter(|keyword| keyword_matches(keyword, text))
                    .map(|keyword| keyword.len())
                    .max()?;
                total += best;
            }
            Some(total)
        }
        Trigger::AnyOf(keywords) => keywords
            .iter()
            .filter(|keyword| keyword_matches(keyword, text))
            .map(|keyword| keyword.len())
            .max(),
    }
}

/// Single words match on token boundaries; multi-word keywords match as a
/// phrase over the normalized text.
fn keyword_matches(keyword: &str, text: &str) -> bool {
    if keyword.contains(' ') {
        text.contains(keyword)
    } else {
        text.split_whitespace().any(|token| token == keyword)
    }
}
