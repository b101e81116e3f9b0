pub mod catalog;
pub mod client;

pub use catalog::CatalogProvider;
pub use client::{
    BackendError, CarbonInsights, CartItem, CartView, CommerceApi, HttpCommerceApi, OrderSummary,
    UserProfile,
};
