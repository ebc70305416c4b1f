// ============================================================================
// Remote Cart API
// ============================================================================
//
// The server-side cart is an external collaborator. `CartApi` mirrors its
// HTTP surface one method per route; `HttpCartApi` talks to the real server
// and `InMemoryCartApi` simulates it in-process.
//
// The remote representation is deliberately a separate type from the local
// `CartState`: the two are connected only by the reconciler.
//
// ============================================================================

pub mod http;
pub mod memory;

pub use http::HttpCartApi;
pub use memory::{InMemoryCartApi, RecordedCall};

use crate::core::{BillingCycle, ItemKind, Result};
use crate::session::RequestIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error contexts prefixed to remote failures shown to the user
pub mod context {
    pub const FETCH_CART: &str = "Failed to load cart";
    pub const SET_BILLING_CYCLE: &str = "Failed to set billing cycle";
    pub const ADD_PLAN: &str = "Failed to set plan";
    pub const ADD_ADDON: &str = "Failed to add addon";
    pub const UPDATE_QUANTITY: &str = "Failed to update item quantity";
    pub const REMOVE_ITEM: &str = "Failed to remove item from cart";
    pub const CHECKOUT: &str = "Checkout failed";
}

/// Fallback when the server gives no usable error text
pub const GENERIC_FAILURE: &str = "unexpected error";

/// One line of the server-side cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartItem {
    pub item_id: String,
    pub item_type: ItemKind,
    pub quantity: i64,
}

impl RemoteCartItem {
    pub fn new(item_id: impl Into<String>, item_type: ItemKind, quantity: i64) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            quantity,
        }
    }
}

/// The server cart as fetched once at the start of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCartSnapshot {
    pub items: Vec<RemoteCartItem>,
    /// `None` when the server reported no (or an unknown) cycle
    pub billing_cycle: Option<BillingCycle>,
}

impl RemoteCartSnapshot {
    pub fn get(&self, item_id: &str) -> Option<&RemoteCartItem> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /api/cart`
    async fn fetch_cart(&self, identity: &RequestIdentity) -> Result<RemoteCartSnapshot>;

    /// `POST /api/cart/billing-cycle`
    async fn set_billing_cycle(&self, identity: &RequestIdentity, cycle: BillingCycle)
    -> Result<()>;

    /// `POST /api/cart/plan`
    async fn add_plan(&self, identity: &RequestIdentity, plan_id: &str, quantity: u32)
    -> Result<()>;

    /// `POST /api/cart/addon`
    async fn add_addon(
        &self,
        identity: &RequestIdentity,
        addon_id: &str,
        quantity: u32,
    ) -> Result<()>;

    /// `PUT /api/cart/item/{id}`
    async fn update_quantity(
        &self,
        identity: &RequestIdentity,
        item_id: &str,
        quantity: u32,
    ) -> Result<()>;

    /// `DELETE /api/cart/item/{id}`
    async fn remove_item(&self, identity: &RequestIdentity, item_id: &str) -> Result<()>;

    /// `POST /api/checkout`, returns the payment redirect URL
    async fn checkout(&self, identity: &RequestIdentity, address_id: Option<&str>)
    -> Result<String>;
}
