//! REST client for the storefront backend.
//!
//! The assistant never talks to the store's database directly; every
//! commerce action goes through this capability trait so tests and the
//! dialogue layer can swap in fakes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use greencart_core::{ProductId, ProductRecord};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend transport failure: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("backend payload could not be interpreted: {0}")]
    Payload(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub cart_item_id: i64,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: String,
    pub placed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub eco_points: i64,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CarbonInsights {
    pub carbon_saved_kg: f64,
    pub eco_points: i64,
}

/// Everything the dialogue layer is allowed to do against the store.
/// `auth` carries the caller's bearer token when present; anonymous calls
/// are passed through and the backend decides what they may see.
#[async_trait]
pub trait CommerceApi: Send + Sync {
    async fn search_products(
        &self,
        query: &str,
        auth: Option<&str>,
    ) -> Result<Vec<ProductRecord>, BackendError>;

    async fn get_cart(&self, auth: Option<&str>) -> Result<CartView, BackendError>;

    async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
        auth: Option<&str>,
    ) -> Result<(), BackendError>;

    async fn remove_from_cart(
        &self,
        cart_item_id: i64,
        auth: Option<&str>,
    ) -> Result<(), BackendError>;

    async fn clear_cart(&self, auth: Option<&str>) -> Result<(), BackendError>;

    async fn checkout(&self, auth: Option<&str>) -> Result<OrderSummary, BackendError>;

    async fn get_orders(&self, auth: Option<&str>) -> Result<Vec<OrderSummary>, BackendError>;

    async fn cancel_order(&self, order_id: &str, auth: Option<&str>)
        -> Result<(), BackendError>;

    async fn get_profile(&self, auth: Option<&str>) -> Result<UserProfile, BackendError>;

    async fn get_carbon_insights(
        &self,
        auth: Option<&str>,
    ) -> Result<CarbonInsights, BackendError>;
}

/// HTTP implementation against the store's `/api/v1` surface.
#[derive(Clone, Debug)]
pub struct HttpCommerceApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCommerceApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| BackendError::Transport(error.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        auth: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match auth {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json(&self, path: &str, auth: Option<&str>) -> Result<Value, BackendError> {
        let request = self.authorize(self.client.get(self.url(path)), auth);
        read_json(request.send().await?).await
    }

    async fn post_json(
        &self,
        path: &str,
        body: Option<&Value>,
        auth: Option<&str>,
    ) -> Result<Value, BackendError> {
        let mut request = self.authorize(self.client.post(self.url(path)), auth);
        if let Some(body) = body {
            request = request.json(body);
        }
        read_json(request.send().await?).await
    }

    async fn delete_json(&self, path: &str, auth: Option<&str>) -> Result<Value, BackendError> {
        let request = self.authorize(self.client.delete(self.url(path)), auth);
        read_json(request.send().await?).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status(status.as_u16()));
    }
    let body = response
        .text()
        .await
        .map_err(|error| BackendError::Payload(error.to_string()))?;
    // Some write endpoints answer with an empty body.
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|error| BackendError::Payload(error.to_string()))
}

/// Backends wrap collections inconsistently; accept the shapes seen in the
/// wild plus a bare array.
pub(crate) fn unwrap_collection(value: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    ["items", "content", "data", "results", "newArrivals"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_array))
}

pub(crate) fn parse_product(value: &Value) -> Option<ProductRecord> {
    let id = value.get("id").and_then(Value::as_i64)?;
    let name = value.get("name").and_then(Value::as_str)?.to_string();
    let price = value.get("price").and_then(Value::as_f64).unwrap_or(0.0);
    let carbon = value
        .get("carbon_footprint")
        .or_else(|| value.get("carbon_emission"))
        .or_else(|| value.get("carbonEmission"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let eco_points = value
        .get("eco_points")
        .or_else(|| value.get("ecoPoints"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let category = value
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or("general")
        .to_string();
    let available = value.get("available").and_then(Value::as_bool).unwrap_or(true);

    Some(ProductRecord {
        id: ProductId(id),
        name,
        price,
        carbon_footprint: carbon.max(0.0),
        eco_points: eco_points as i32,
        category,
        available,
    })
}

fn parse_cart(value: &Value) -> CartView {
    let items = unwrap_collection(value)
        .map(|rows| rows.iter().filter_map(parse_cart_item).collect::<Vec<_>>())
        .unwrap_or_default();

    let total = value
        .get("total")
        .or_else(|| value.get("cartTotal"))
        .and_then(Value::as_f64)
        .unwrap_or_else(|| {
            items.iter().map(|item| item.unit_price * f64::from(item.quantity)).sum()
        });

    CartView { items, total }
}

fn parse_cart_item(value: &Value) -> Option<CartItem> {
    let cart_item_id = value
        .get("cart_item_id")
        .or_else(|| value.get("cartItemId"))
        .or_else(|| value.get("id"))
        .and_then(Value::as_i64)?;
    let name = value
        .get("name")
        .or_else(|| value.get("productName"))
        .and_then(Value::as_str)?
        .to_string();
    let quantity = value.get("quantity").and_then(Value::as_u64).unwrap_or(1) as u32;
    let unit_price = value
        .get("unit_price")
        .or_else(|| value.get("price"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    Some(CartItem { cart_item_id, name, quantity, unit_price })
}

fn parse_order(value: &Value) -> Option<OrderSummary> {
    let order_id = match value.get("order_id").or_else(|| value.get("orderId")) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => match value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return None,
        },
    };
    let status = value
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("PLACED")
        .to_string();
    let placed_at = value
        .get("placed_at")
        .or_else(|| value.get("createdAt"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok());

    Some(OrderSummary { order_id, status, placed_at })
}

#[async_trait]
impl CommerceApi for HttpCommerceApi {
    async fn search_products(
        &self,
        query: &str,
        auth: Option<&str>,
    ) -> Result<Vec<ProductRecord>, BackendError> {
        let path = format!("/products/search?q={}", urlencode(query));
        let value = self.get_json(&path, auth).await?;
        let rows = unwrap_collection(&value)
            .ok_or_else(|| BackendError::Payload("product search returned no collection".into()))?;
        Ok(rows.iter().filter_map(parse_product).collect())
    }

    async fn get_cart(&self, auth: Option<&str>) -> Result<CartView, BackendError> {
        let value = self.get_json("/cart", auth).await?;
        Ok(parse_cart(&value))
    }

    async fn add_to_cart(
        &self,
        product_id: ProductId,
        quantity: u32,
        auth: Option<&str>,
    ) -> Result<(), BackendError> {
        let body = serde_json::json!({ "productId": product_id.0, "quantity": quantity });
        self.post_json("/cart/add", Some(&body), auth).await?;
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        cart_item_id: i64,
        auth: Option<&str>,
    ) -> Result<(), BackendError> {
        self.delete_json(&format!("/cart/remove/{cart_item_id}"), auth).await?;
        Ok(())
    }

    async fn clear_cart(&self, auth: Option<&str>) -> Result<(), BackendError> {
        self.post_json("/cart/clear", None, auth).await?;
        Ok(())
    }

    async fn checkout(&self, auth: Option<&str>) -> Result<OrderSummary, BackendError> {
        let value = self.post_json("/checkout", None, auth).await?;
        parse_order(&value)
            .or_else(|| value.get("order").and_then(parse_order))
            .ok_or_else(|| BackendError::Payload("checkout response had no order".into()))
    }

    async fn get_orders(&self, auth: Option<&str>) -> Result<Vec<OrderSummary>, BackendError> {
        let value = self.get_json("/profile/orders", auth).await?;
        let rows = unwrap_collection(&value)
            .ok_or_else(|| BackendError::Payload("order list returned no collection".into()))?;
        Ok(rows.iter().filter_map(parse_order).collect())
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        auth: Option<&str>,
    ) -> Result<(), BackendError> {
        self.post_json(&format!("/profile/orders/{order_id}/cancel"), None, auth).await?;
        Ok(())
    }

    async fn get_profile(&self, auth: Option<&str>) -> Result<UserProfile, BackendError> {
        let value = self.get_json("/profile", auth).await?;
        Ok(UserProfile {
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
            email: value.get("email").and_then(Value::as_str).map(str::to_string),
            eco_points: value
                .get("eco_points")
                .or_else(|| value.get("ecoPoints"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
        })
    }

    async fn get_carbon_insights(
        &self,
        auth: Option<&str>,
    ) -> Result<CarbonInsights, BackendError> {
        let value = self.get_json("/profile/carbon-insights", auth).await?;
        Ok(CarbonInsights {
            carbon_saved_kg: value
                .get("carbon_saved_kg")
                .or_else(|| value.get("carbonSavedKg"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            eco_points: value
                .get("eco_points")
                .or_else(|| value.get("ecoPoints"))
                .and_then(Value::as_i64)
                .unwrap_or(0),
        })
    }
}

fn urlencode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            b' ' => encoded.push('+'),
            other => {
                encoded.push('%');
                encoded.push_str(&format!("{other:02X}"));
            }
        }
    }
    encoded
}
