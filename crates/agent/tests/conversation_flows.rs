//! End-to-end conversation flows against an in-memory storefront fake.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use greencart_agent::{ChatRequest, ChatResponse, Orchestrator, ReplyStatus};
use greencart_backend::{
    BackendError, CarbonInsights, CartItem, CartView, CommerceApi, OrderSummary, UserProfile,
};
use greencart_core::{AppConfig, ProductId, ProductRecord};

fn product(id: i64, name: &str, price: f64, carbon: f64, points: i32) -> ProductRecord {
    ProductRecord {
        id: ProductId(id),
        name: name.to_string(),
        price,
        carbon_footprint: carbon,
        eco_points: points,
        category: "drinkware".to_string(),
        available: true,
    }
}

#[derive(Default)]
struct StoreState {
    cart: Vec<CartItem>,
    orders: Vec<OrderSummary>,
}

struct FakeStore {
    products: Vec<ProductRecord>,
    state: Mutex<StoreState>,
    next_cart_item_id: AtomicI64,
    fail_writes: bool,
}

impl FakeStore {
    fn new() -> Self {
        Self {
            products: vec![
                product(1, "Bamboo Bottle", 349.0, 2.5, 85),
                product(2, "Plastic Bottle", 99.0, 5.8, 20),
                product(3, "Eco Cup", 199.0, 1.9, 78),
            ],
            state: Mutex::new(StoreState::default()),
            next_cart_item_id: AtomicI64::new(1),
            fail_writes: false,
        }
    }

    fn failing_writes() -> Self {
        Self { fail_writes: true, ..Self::new() }
    }

    fn with_order(order_id: &str) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().orders.push(OrderSummary {
            order_id: order_id.to_string(),
            status: "Processing".to_string(),
            placed_at: None,
        });
        store
    }

    fn cart_len(&self) -> usize {
        self.state.lock().unwrap().cart.len()
    }

    fn order_status(&self, order_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|order| order.order_id == order_id)
            .map(|order| order.status.clone())
    }
}

#[async_trait]
impl CommerceApi for FakeStore {
    async fn search_products(
        &self,
        _query: &str,
        _auth: Option<&str>,
    ) -> Result<Vec<ProductRecord>, BackendError> {
        Ok(self.products.clone())
    }

    async fn get_cart(&self, _auth: Option<&str>) -> Result<CartView, BackendError> {
        let state = self.state.lock().unwrap();
        let total = state
            .cart
            .iter()
            .map(|item| item.unit_price * f64::from(item.quantity))
            .sum();
        Ok(CartView { items: state.cart.clone(), total })
    }

    async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
        _auth: Option<&str>,
    ) -> Result<(), BackendError> {
        if self.fail_writes {
            return Err(BackendError::Status(500));
        }
        let record = self
            .products
            .iter()
            .find(|record| record.id == product_id)
            .ok_or(BackendError::Status(404))?;
        self.state.lock().unwrap().cart.push(CartItem {
            cart_item_id: self.next_cart_item_id.fetch_add(1, Ordering::SeqCst),
            name: record.name.clone(),
            quantity,
            unit_price: record.price,
        });
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        cart_item_id: i64,
        _auth: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let before = state.cart.len();
        state.cart.retain(|item| item.cart_item_id != cart_item_id);
        if state.cart.len() == before {
            return Err(BackendError::Status(404));
        }
        Ok(())
    }

    async fn clear_cart(&self, _auth: Option<&str>) -> Result<(), BackendError> {
        self.state.lock().unwrap().cart.clear();
        Ok(())
    }

    async fn checkout(&self, _auth: Option<&str>) -> Result<OrderSummary, BackendError> {
        let mut state = self.state.lock().unwrap();
        let order = OrderSummary {
            order_id: format!("ORD{}", 1000 + state.orders.len()),
            status: "Processing".to_string(),
            placed_at: None,
        };
        state.cart.clear();
        state.orders.insert(0, order.clone());
        Ok(order)
    }

    async fn get_orders(&self, _auth: Option<&str>) -> Result<Vec<OrderSummary>, BackendError> {
        Ok(self.state.lock().unwrap().orders.clone())
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        _auth: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|order| order.order_id == order_id)
            .ok_or(BackendError::Status(404))?;
        order.status = "Cancelled".to_string();
        Ok(())
    }

    async fn get_profile(&self, _auth: Option<&str>) -> Result<UserProfile, BackendError> {
        Ok(UserProfile::default())
    }

    async fn get_carbon_insights(
        &self,
        _auth: Option<&str>,
    ) -> Result<CarbonInsights, BackendError> {
        Ok(CarbonInsights { carbon_saved_kg: 12.5, eco_points: 240 })
    }
}

fn orchestrator(store: Arc<FakeStore>) -> Orchestrator {
    Orchestrator::new(store, &AppConfig::default())
}

async fn say(agent: &Orchestrator, text: &str) -> ChatResponse {
    say_as(agent, text, "tester").await
}

async fn say_as(agent: &Orchestrator, text: &str, user_id: &str) -> ChatResponse {
    agent
        .handle(
            ChatRequest {
                text: text.to_string(),
                user_id: user_id.to_string(),
                auth_token: None,
            },
            "test-turn",
        )
        .await
}

#[tokio::test]
async fn add_show_checkout_coupon_confirm_flow() {
    let store = Arc::new(FakeStore::new());
    let agent = orchestrator(store.clone());

    let added = say(&agent, "add 2 bamboo bottles to my cart").await;
    assert_eq!(added.status, ReplyStatus::Success, "add reply: {}", added.reply);
    assert!(added.reply.contains("Bamboo Bottle"));
    assert_eq!(store.cart_len(), 1);

    let shown = say(&agent, "show my cart").await;
    assert_eq!(shown.status, ReplyStatus::Success);
    assert!(shown.reply.contains("Bamboo Bottle (x2)"));

    let checkout = say(&agent, "checkout").await;
    assert_eq!(checkout.status, ReplyStatus::Clarify);
    assert!(checkout.reply.contains("SAVE15"), "coupon prompt lists codes: {}", checkout.reply);

    let coupon = say(&agent, "SAVE15").await;
    assert_eq!(coupon.status, ReplyStatus::Clarify);
    assert!(coupon.reply.contains("Coupon SAVE15 applied"), "got: {}", coupon.reply);

    let confirmed = say(&agent, "confirm my order").await;
    assert_eq!(confirmed.status, ReplyStatus::Success);
    assert!(confirmed.reply.contains("Order placed successfully"));
    assert_eq!(store.cart_len(), 0);
}

#[tokio::test]
async fn invalid_coupon_keeps_the_slot_open_and_skip_closes_it() {
    let store = Arc::new(FakeStore::new());
    let agent = orchestrator(store);

    say(&agent, "add eco cup to my cart").await;
    say(&agent, "checkout").await;

    let invalid = say(&agent, "BOGUS99").await;
    assert_eq!(invalid.status, ReplyStatus::Clarify);
    assert!(invalid.reply.contains("not a valid coupon"), "got: {}", invalid.reply);

    // The slot survived the invalid attempt, so a skip still resolves it.
    let skipped = say(&agent, "skip").await;
    assert_eq!(skipped.status, ReplyStatus::Clarify);
    assert!(skipped.reply.contains("No coupon applied"), "got: {}", skipped.reply);
}

#[tokio::test]
async fn cancellation_requires_explicit_confirmation() {
    let store = Arc::new(FakeStore::with_order("ORD42"));
    let agent = orchestrator(store.clone());

    let asked = say(&agent, "cancel my order").await;
    assert_eq!(asked.status, ReplyStatus::Clarify);
    assert!(asked.reply.contains("ORD42"));
    assert_eq!(store.order_status("ORD42").as_deref(), Some("Processing"));

    let confirmed = say(&agent, "yes").await;
    assert_eq!(confirmed.status, ReplyStatus::Success);
    assert_eq!(store.order_status("ORD42").as_deref(), Some("Cancelled"));
}

#[tokio::test]
async fn declining_a_cancellation_keeps_the_order() {
    let store = Arc::new(FakeStore::with_order("ORD42"));
    let agent = orchestrator(store.clone());

    say(&agent, "cancel my order").await;
    let declined = say(&agent, "no keep it").await;

    assert_eq!(declined.status, ReplyStatus::Success);
    assert_eq!(store.order_status("ORD42").as_deref(), Some("Processing"));
}

#[tokio::test]
async fn backend_write_failure_surfaces_as_error_status() {
    let store = Arc::new(FakeStore::failing_writes());
    let agent = orchestrator(store);

    let response = say(&agent, "add a bamboo bottle to my cart").await;
    assert_eq!(response.status, ReplyStatus::Error);
    assert_eq!(response.error.as_deref(), Some("backend_action_failed"));
}

#[tokio::test]
async fn blank_text_asks_for_input_instead_of_erroring() {
    let agent = orchestrator(Arc::new(FakeStore::new()));

    let response = say(&agent, "   ").await;
    assert_eq!(response.status, ReplyStatus::Clarify);
    assert_eq!(response.error.as_deref(), Some("malformed_request"));
}

#[tokio::test]
async fn unrelated_command_abandons_the_pending_flow() {
    let store = Arc::new(FakeStore::new());
    let agent = orchestrator(store);

    say(&agent, "add eco cup to cart").await;
    say(&agent, "checkout").await;

    let detour = say(&agent, "show my cart").await;
    assert_eq!(detour.status, ReplyStatus::Success);

    // The coupon slot is gone, so a bare code no longer resolves.
    let stale_code = say(&agent, "SAVE15").await;
    assert_eq!(stale_code.status, ReplyStatus::Clarify);
    assert_eq!(stale_code.error.as_deref(), Some("intent_unresolved"));
}

#[tokio::test]
async fn recommendation_ranks_by_carbon_ascending() {
    let agent = orchestrator(Arc::new(FakeStore::new()));

    let response = say(&agent, "recommend an eco friendly bottle").await;
    assert_eq!(response.status, ReplyStatus::Success);

    let bamboo = response.reply.find("Bamboo Bottle").expect("bamboo listed");
    let plastic = response.reply.find("Plastic Bottle").expect("plastic listed");
    assert!(bamboo < plastic, "lower-carbon product should rank first: {}", response.reply);
}

#[tokio::test]
async fn comparison_names_the_greener_product() {
    let agent = orchestrator(Arc::new(FakeStore::new()));

    let response = say(&agent, "compare bamboo bottle vs plastic bottle").await;
    assert_eq!(response.status, ReplyStatus::Success);
    assert!(response.reply.starts_with("Bamboo Bottle is the greener choice"), "{}", response.reply);
}

#[tokio::test]
async fn eco_tips_rotate_per_user_and_replay_from_a_fresh_start() {
    let agent = orchestrator(Arc::new(FakeStore::new()));

    let first = say(&agent, "give me an eco tip").await;
    let second = say(&agent, "give me an eco tip").await;
    assert_eq!(first.status, ReplyStatus::Success);
    assert_ne!(first.reply, second.reply, "repeating the request should advance the rotation");

    // Another user starts their own rotation from the top.
    let other_user = say_as(&agent, "give me an eco tip", "someone-else").await;
    assert_eq!(other_user.reply, first.reply);

    // A fresh orchestrator replays the same sequence.
    let restarted = orchestrator(Arc::new(FakeStore::new()));
    let replay = say(&restarted, "give me an eco tip").await;
    assert_eq!(replay.reply, first.reply);
}

#[tokio::test]
async fn removing_a_fuzzy_named_item_targets_the_cart_not_the_catalog() {
    let store = Arc::new(FakeStore::new());
    let agent = orchestrator(store.clone());

    say(&agent, "add a bamboo bottle to my cart").await;
    let removed = say(&agent, "remove bambo botle from my cart").await;

    assert_eq!(removed.status, ReplyStatus::Success, "got: {}", removed.reply);
    assert_eq!(store.cart_len(), 0);
}
