//! Intent handlers. Each returns either a finished reply or a question that
//! leaves the turn with the user; failures are typed, never panics.

use std::sync::PoisonError;

use chrono::{Duration, Utc};

use greencart_backend::BackendError;
use greencart_core::{
    CatalogSnapshot, Classification, ComparisonOutcome, CoreError, EntityBundle, Intent,
    PendingAction, ProductRecord, Utterance,
};

use crate::orchestrator::{Orchestrator, Outcome};

const ECO_TIPS: &[&str] = &[
    "Switch to reusable bottles to reduce single-use plastic.",
    "Carry your own shopping bag instead of plastic ones.",
    "Opt for bamboo toothbrushes, they decompose naturally.",
    "Save water by turning off the tap while brushing.",
];

impl Orchestrator {
    pub(crate) async fn dispatch(
        &self,
        utterance: &Utterance,
        classification: &Classification,
        snapshot: &CatalogSnapshot,
        pending: Option<PendingAction>,
    ) -> Result<Outcome, CoreError> {
        if classification.from_pending() {
            return self.resolve_pending(utterance, classification, pending).await;
        }

        let bundle = self.extractor.extract(utterance.normalized(), snapshot);

        match classification.intent {
            Intent::CartAdd => self.cart_add(utterance, &bundle, snapshot).await,
            Intent::CartShow => self.cart_show(utterance).await,
            Intent::CartRemove => self.cart_remove(utterance, &bundle).await,
            Intent::CartClear => self.cart_clear(utterance).await,
            Intent::Checkout => self.checkout(utterance).await,
            Intent::ApplyCoupon => Ok(self.coupon_outside_checkout(&bundle)),
            Intent::ConfirmOrder => self.confirm_order(utterance).await,
            Intent::TrackOrder => self.track_order(utterance).await,
            Intent::CancelOrder => self.cancel_order(utterance).await,
            Intent::EcoRecommendation => self.eco_recommendation(&bundle, snapshot),
            Intent::EcoComparison => self.eco_comparison(utterance, snapshot),
            Intent::EcoInfo => self.eco_info(&bundle),
            Intent::EcoRank => self.eco_rank(&bundle, snapshot),
            Intent::CarbonImpact => self.carbon_impact(utterance).await,
            Intent::Greeting => Ok(Outcome::Done(
                "Hey! Welcome to GreenCart. I can recommend eco-friendly products, manage \
                 your cart, or track your orders."
                    .to_string(),
            )),
            Intent::EcoTip => Ok(self.eco_tip(utterance)),
            Intent::PaymentMethod => Ok(payment_method(utterance)),
            Intent::SmallTalk => Ok(small_talk(utterance)),
            Intent::Unknown => Err(CoreError::IntentUnresolved),
        }
    }

    /// Responses that resolve an outstanding slot. The classifier only routes
    /// here when the utterance shape matches the slot, so a missing slot
    /// means it expired between classification and dispatch.
    async fn resolve_pending(
        &self,
        utterance: &Utterance,
        classification: &Classification,
        pending: Option<PendingAction>,
    ) -> Result<Outcome, CoreError> {
        match (classification.matched_rule, pending) {
            ("pending.coupon.code", Some(PendingAction::AwaitingCoupon { cart_total })) => {
                Ok(self.resolve_coupon_code(utterance, cart_total))
            }
            ("pending.coupon.skip", Some(PendingAction::AwaitingCoupon { cart_total })) => {
                self.pending.clear(utterance.user_id());
                Ok(Outcome::NeedsInput(format!(
                    "No coupon applied. Your total stays at {}. Say 'confirm' to place the order.",
                    rupees(cart_total)
                )))
            }
            ("pending.cancel.accept", Some(PendingAction::AwaitingConfirmation { order_id })) => {
                self.backend
                    .cancel_order(&order_id, utterance.auth_token())
                    .await
                    .map_err(backend_failure)?;
                self.pending.clear(utterance.user_id());
                Ok(Outcome::Done(format!("Order {order_id} has been cancelled.")))
            }
            ("pending.cancel.decline", Some(PendingAction::AwaitingConfirmation { order_id })) => {
                self.pending.clear(utterance.user_id());
                Ok(Outcome::Done(format!("Okay, order {order_id} stays as it is.")))
            }
            _ => Err(CoreError::IntentUnresolved),
        }
    }

    fn resolve_coupon_code(&self, utterance: &Utterance, cart_total: f64) -> Outcome {
        let Some(code) = utterance
            .tokens()
            .find(|token| greencart_core::looks_like_coupon_code(token))
            .map(str::to_uppercase)
        else {
            return Outcome::NeedsInput(self.coupon_prompt(cart_total));
        };

        if !self.coupon_codes.contains(&code) {
            // Slot stays open so the user can retry or skip.
            return Outcome::NeedsInput(format!(
                "{code} is not a valid coupon. Try one of {} or say 'skip'.",
                self.coupon_codes.join(", ")
            ));
        }

        self.pending.clear(utterance.user_id());
        let percent = coupon_percent(&code);
        let discounted = cart_total * (100.0 - f64::from(percent)) / 100.0;
        Outcome::NeedsInput(format!(
            "Coupon {code} applied ({percent}% off). New total: {}. Say 'confirm' to place \
             the order.",
            rupees(discounted)
        ))
    }

    fn coupon_prompt(&self, cart_total: f64) -> String {
        format!(
            "Your total is {}. Would you like to apply a coupon code? ({}) Or say 'skip'.",
            rupees(cart_total),
            self.coupon_codes.join(", ")
        )
    }

    async fn cart_add(
        &self,
        utterance: &Utterance,
        bundle: &EntityBundle,
        snapshot: &CatalogSnapshot,
    ) -> Result<Outcome, CoreError> {
        let matched = bundle.product.as_ref().ok_or(CoreError::ExtractionAmbiguous)?;
        let record = &matched.record;

        self.backend
            .add_to_cart(record.id, bundle.quantity, utterance.auth_token())
            .await
            .map_err(backend_failure)?;

        let mut reply = format!(
            "{} added to your cart for {} x {}.",
            record.name,
            rupees(record.price),
            bundle.quantity
        );
        if let Some(nudge) = related_nudge(snapshot, record) {
            reply.push_str(&format!(" You might also like {nudge}."));
        }
        Ok(Outcome::Done(reply))
    }

    async fn cart_show(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let cart = self.backend.get_cart(utterance.auth_token()).await.map_err(backend_failure)?;

        if cart.items.is_empty() {
            return Ok(Outcome::Done(
                "Your cart is empty. Add some products to get started!".to_string(),
            ));
        }

        let mut lines = vec![format!("You have {} item(s) in your cart:", cart.items.len())];
        for item in &cart.items {
            lines.push(format!(
                "{} (x{}) - {}",
                item.name,
                item.quantity,
                rupees(item.unit_price * f64::from(item.quantity))
            ));
        }
        lines.push(format!("Total = {}", rupees(cart.total)));
        Ok(Outcome::Done(lines.join("\n")))
    }

    async fn cart_remove(
        &self,
        utterance: &Utterance,
        bundle: &EntityBundle,
    ) -> Result<Outcome, CoreError> {
        let span = bundle.query_span.as_deref().ok_or(CoreError::ExtractionAmbiguous)?;

        let cart = self.backend.get_cart(utterance.auth_token()).await.map_err(backend_failure)?;
        if cart.items.is_empty() {
            return Ok(Outcome::Done("Your cart is empty.".to_string()));
        }

        // Match against what is actually in the cart, not the catalog.
        let Some(matched) =
            self.matcher.best(span, cart.items.iter().map(|item| item.name.as_str()))
        else {
            return Ok(Outcome::NeedsInput(format!("I couldn't find '{span}' in your cart.")));
        };
        let item = &cart.items[matched.index];

        self.backend
            .remove_from_cart(item.cart_item_id, utterance.auth_token())
            .await
            .map_err(backend_failure)?;
        Ok(Outcome::Done(format!("Removed {} from your cart.", item.name)))
    }

    async fn cart_clear(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        self.backend.clear_cart(utterance.auth_token()).await.map_err(backend_failure)?;
        Ok(Outcome::Done("Your cart has been cleared!".to_string()))
    }

    async fn checkout(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let cart = self.backend.get_cart(utterance.auth_token()).await.map_err(backend_failure)?;
        if cart.items.is_empty() || cart.total <= 0.0 {
            return Ok(Outcome::Done("Your cart is empty!".to_string()));
        }

        self.pending
            .set(utterance.user_id(), PendingAction::AwaitingCoupon { cart_total: cart.total });
        Ok(Outcome::NeedsInput(self.coupon_prompt(cart.total)))
    }

    /// `apply coupon ...` outside the checkout flow only records intent; the
    /// discount itself is negotiated when checkout reports a total.
    fn coupon_outside_checkout(&self, bundle: &EntityBundle) -> Outcome {
        match &bundle.coupon_code {
            Some(code) if self.coupon_codes.contains(code) => Outcome::Done(format!(
                "Coupon {code} noted. Say 'checkout' and I'll apply it to your total."
            )),
            _ => Outcome::NeedsInput(format!(
                "Please mention a valid coupon code ({}).",
                self.coupon_codes.join(", ")
            )),
        }
    }

    async fn confirm_order(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let order =
            self.backend.checkout(utterance.auth_token()).await.map_err(backend_failure)?;
        self.pending.clear(utterance.user_id());
        Ok(Outcome::Done(format!("Order placed successfully! Order ID: {}", order.order_id)))
    }

    async fn track_order(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let orders =
            self.backend.get_orders(utterance.auth_token()).await.map_err(backend_failure)?;
        let Some(latest) = orders.first() else {
            return Ok(Outcome::Done("You haven't placed any orders yet.".to_string()));
        };

        let eta = Utc::now() + Duration::hours(24);
        Ok(Outcome::Done(format!(
            "Order {} status: {}. Estimated delivery by {}.",
            latest.order_id,
            latest.status,
            eta.format("%d %b %Y")
        )))
    }

    async fn cancel_order(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let orders =
            self.backend.get_orders(utterance.auth_token()).await.map_err(backend_failure)?;
        let Some(latest) = orders.first() else {
            return Ok(Outcome::Done("You haven't placed any orders yet.".to_string()));
        };

        self.pending.set(
            utterance.user_id(),
            PendingAction::AwaitingConfirmation { order_id: latest.order_id.clone() },
        );
        Ok(Outcome::NeedsInput(format!(
            "Are you sure you want to cancel order {}? (yes/no)",
            latest.order_id
        )))
    }

    fn eco_recommendation(
        &self,
        bundle: &EntityBundle,
        snapshot: &CatalogSnapshot,
    ) -> Result<Outcome, CoreError> {
        if snapshot.is_empty() {
            return Err(CoreError::CatalogUnavailable);
        }

        let query = bundle.query_span.as_deref().unwrap_or("");
        let picks = self.engine.recommend(query, bundle.budget_ceiling, None, snapshot);
        if picks.is_empty() {
            return Ok(Outcome::NeedsInput(
                "I couldn't find a match for that. Which kind of product are you after, \
                 for example bottles, bags, or kitchenware?"
                    .to_string(),
            ));
        }

        Ok(Outcome::Done(format_ranking("Here are the greenest picks for you:", &picks)))
    }

    fn eco_comparison(
        &self,
        utterance: &Utterance,
        snapshot: &CatalogSnapshot,
    ) -> Result<Outcome, CoreError> {
        if snapshot.is_empty() {
            return Err(CoreError::CatalogUnavailable);
        }
        let (first, second) = parse_comparison_pair(utterance.normalized())
            .ok_or(CoreError::ExtractionAmbiguous)?;

        match self.engine.compare(&first, &second, snapshot) {
            ComparisonOutcome::Winner { winner, loser, percent_less_carbon } => {
                Ok(Outcome::Done(format!(
                    "{} is the greener choice: {percent_less_carbon}% less carbon than {} \
                     ({} vs {} kg CO2e).",
                    winner.name, loser.name, winner.carbon_footprint, loser.carbon_footprint
                )))
            }
            ComparisonOutcome::Unresolved { unmatched } => Ok(Outcome::NeedsInput(format!(
                "I couldn't identify {} in the catalog. Could you use the product names as \
                 listed in the store?",
                unmatched.join(" and ")
            ))),
        }
    }

    fn eco_info(&self, bundle: &EntityBundle) -> Result<Outcome, CoreError> {
        let matched = bundle.product.as_ref().ok_or(CoreError::ExtractionAmbiguous)?;
        let record = &matched.record;
        Ok(Outcome::Done(format!(
            "{} has a carbon footprint of {} kg CO2e and earns {} eco points.",
            record.name, record.carbon_footprint, record.eco_points
        )))
    }

    fn eco_rank(
        &self,
        bundle: &EntityBundle,
        snapshot: &CatalogSnapshot,
    ) -> Result<Outcome, CoreError> {
        if snapshot.is_empty() {
            return Err(CoreError::CatalogUnavailable);
        }

        let picks = self.engine.recommend("", bundle.budget_ceiling, None, snapshot);
        if picks.is_empty() {
            return Ok(Outcome::NeedsInput(
                "Nothing in the catalog fits that budget. Want me to rank without one?"
                    .to_string(),
            ));
        }
        Ok(Outcome::Done(format_ranking("Greenest products right now:", &picks)))
    }

    /// Tips rotate per user: each request advances that user's cursor, so a
    /// fresh process replays the same sequence.
    fn eco_tip(&self, utterance: &Utterance) -> Outcome {
        let mut cursors = self.tip_cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let cursor = cursors.entry(utterance.user_id().to_string()).or_insert(0);
        let tip = ECO_TIPS[*cursor % ECO_TIPS.len()];
        *cursor = (*cursor + 1) % ECO_TIPS.len();
        Outcome::Done(tip.to_string())
    }

    async fn carbon_impact(&self, utterance: &Utterance) -> Result<Outcome, CoreError> {
        let insights = self
            .backend
            .get_carbon_insights(utterance.auth_token())
            .await
            .map_err(backend_failure)?;
        Ok(Outcome::Done(format!(
            "You've saved {} kg CO2e so far and earned {} eco points. Keep it up!",
            insights.carbon_saved_kg, insights.eco_points
        )))
    }
}

fn backend_failure(error: BackendError) -> CoreError {
    CoreError::BackendActionFailed(error.to_string())
}

/// Whole rupee amounts print without decimals, everything else with two.
fn rupees(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("₹{}", amount as i64)
    } else {
        format!("₹{amount:.2}")
    }
}

/// Discount percent is encoded in the code itself (SAVE15, ECO10, GREEN5).
fn coupon_percent(code: &str) -> u8 {
    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(5)
}

/// Lowest-carbon alternative from the same category, used as a nudge after
/// an add-to-cart.
fn related_nudge(snapshot: &CatalogSnapshot, record: &ProductRecord) -> Option<String> {
    snapshot
        .records
        .iter()
        .filter(|other| {
            other.id != record.id && other.available && other.category == record.category
        })
        .min_by(|a, b| a.carbon_footprint.total_cmp(&b.carbon_footprint))
        .filter(|other| other.carbon_footprint < record.carbon_footprint)
        .map(|other| other.name.clone())
}

fn format_ranking(heading: &str, picks: &[ProductRecord]) -> String {
    let mut lines = vec![heading.to_string()];
    for (position, record) in picks.iter().enumerate() {
        lines.push(format!(
            "{}. {} - {} ({} kg CO2e, {} eco points)",
            position + 1,
            record.name,
            rupees(record.price),
            record.carbon_footprint,
            record.eco_points
        ));
    }
    lines.join("\n")
}

/// Splits "compare X vs Y" style text into the two product spans.
fn parse_comparison_pair(text: &str) -> Option<(String, String)> {
    let mut stripped = text.to_string();
    for filler in
        ["difference between", "which is greener", "whats greener", "compare", "greener"]
    {
        stripped = stripped.replace(filler, " ");
    }

    for separator in [" vs ", " versus ", " and ", " or "] {
        if let Some((left, right)) = stripped.split_once(separator) {
            let left = left.trim();
            let right = right.trim();
            if !left.is_empty() && !right.is_empty() {
                return Some((left.to_string(), right.to_string()));
            }
        }
    }
    None
}

fn payment_method(utterance: &Utterance) -> Outcome {
    let text = utterance.normalized();
    let chosen = ["net banking", "upi", "cod", "wallet"]
        .into_iter()
        .find(|method| text.contains(method));
    match chosen {
        Some(method) => Outcome::Done(format!(
            "Payment method set to {}. Please confirm your order.",
            method.to_uppercase()
        )),
        None => Outcome::NeedsInput("Please choose UPI, COD, Net Banking or Wallet.".to_string()),
    }
}

fn small_talk(utterance: &Utterance) -> Outcome {
    if utterance.normalized().contains("thank") {
        Outcome::Done("You're welcome, glad to help!".to_string())
    } else {
        Outcome::Done("Goodbye! Stay eco-friendly.".to_string())
    }
}
