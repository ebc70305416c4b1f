//! In-process simulation of the cart server
//!
//! Follows the storefront backend's cart rules (plans added twice accumulate,
//! add-ons are added once, non-positive quantity updates delete, checkout
//! refuses an empty cart) and records every call it receives. By default an
//! added add-on takes the requested quantity; `with_single_addon_units`
//! switches to the backend's behaviour of always inserting one unit.
//! Failures and latency can be injected to exercise the reconciler's abort
//! and timeout paths.

use super::{CartApi, RemoteCartItem, RemoteCartSnapshot, context};
use crate::catalog::Catalog;
use crate::core::{BillingCycle, ItemKind, Result, StorefrontError};
use crate::session::RequestIdentity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A call as received by the simulated server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    FetchCart,
    SetBillingCycle(BillingCycle),
    AddPlan { plan_id: String, quantity: u32 },
    AddAddon { addon_id: String, quantity: u32 },
    UpdateQuantity { item_id: String, quantity: u32 },
    RemoveItem { item_id: String },
    Checkout { address_id: Option<String> },
}

impl RecordedCall {
    /// Calls that change the server cart
    pub fn is_mutating(&self) -> bool {
        !matches!(self, RecordedCall::FetchCart | RecordedCall::Checkout { .. })
    }

    /// Calls that change line items (everything mutating except the cycle)
    pub fn is_item_mutation(&self) -> bool {
        matches!(
            self,
            RecordedCall::AddPlan { .. }
                | RecordedCall::AddAddon { .. }
                | RecordedCall::UpdateQuantity { .. }
                | RecordedCall::RemoveItem { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct ServerCart {
    items: Vec<RemoteCartItem>,
    billing_cycle: BillingCycle,
}

impl Default for ServerCart {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            billing_cycle: BillingCycle::Monthly,
        }
    }
}

type FailurePredicate = Box<dyn Fn(&RecordedCall) -> bool + Send + Sync>;

struct Failure {
    predicate: FailurePredicate,
    message: String,
}

#[derive(Default)]
struct ServerState {
    carts: HashMap<String, ServerCart>,
    calls: Vec<RecordedCall>,
    failure: Option<Failure>,
}

pub struct InMemoryCartApi {
    state: Mutex<ServerState>,
    catalog: Option<Catalog>,
    latency: Option<Duration>,
    single_addon_units: bool,
    checkout_base: String,
}

impl Default for InMemoryCartApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCartApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            catalog: None,
            latency: None,
            single_addon_units: false,
            checkout_base: "https://payments.example/checkout".to_string(),
        }
    }

    /// Reject ids that are not in `catalog`, like the real backend does
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Delay every call, e.g. to trip the reconciler's timeout
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Ignore the requested quantity when adding an add-on and insert one
    /// unit, as the real backend does
    pub fn with_single_addon_units(mut self) -> Self {
        self.single_addon_units = true;
        self
    }

    /// Put a cart on the server as if earlier runs had left it there
    pub fn seed(&self, session_id: &str, items: Vec<RemoteCartItem>, cycle: BillingCycle) {
        self.lock().carts.insert(
            session_id.to_string(),
            ServerCart {
                items,
                billing_cycle: cycle,
            },
        );
    }

    pub fn cart(&self, session_id: &str) -> RemoteCartSnapshot {
        let state = self.lock();
        let cart = state.carts.get(session_id).cloned().unwrap_or_default();
        RemoteCartSnapshot {
            items: cart.items,
            billing_cycle: Some(cart.billing_cycle),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_mutating())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fail every call matching `predicate` with `message` until cleared
    pub fn fail_when<F>(&self, predicate: F, message: impl Into<String>)
    where
        F: Fn(&RecordedCall) -> bool + Send + Sync + 'static,
    {
        self.lock().failure = Some(Failure {
            predicate: Box::new(predicate),
            message: message.into(),
        });
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, apply injected failure, then run `apply` on the cart
    async fn handle<T, F>(
        &self,
        identity: &RequestIdentity,
        call: RecordedCall,
        context: &'static str,
        apply: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut ServerCart, Option<&Catalog>) -> std::result::Result<T, String>,
    {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.calls.push(call.clone());

        if let Some(failure) = &state.failure {
            if (failure.predicate)(&call) {
                return Err(StorefrontError::remote(context, failure.message.clone()));
            }
        }

        if identity.session_id().is_empty() {
            return Err(StorefrontError::remote(context, "session_id required"));
        }

        let cart = state
            .carts
            .entry(identity.session_id().to_string())
            .or_default();
        apply(cart, self.catalog.as_ref()).map_err(|message| StorefrontError::remote(context, message))
    }
}

fn position(cart: &ServerCart, item_id: &str) -> Option<usize> {
    cart.items.iter().position(|item| item.item_id == item_id)
}

#[async_trait]
impl CartApi for InMemoryCartApi {
    async fn fetch_cart(&self, identity: &RequestIdentity) -> Result<RemoteCartSnapshot> {
        self.handle(identity, RecordedCall::FetchCart, context::FETCH_CART, |cart, _| {
            Ok(RemoteCartSnapshot {
                items: cart.items.clone(),
                billing_cycle: Some(cart.billing_cycle),
            })
        })
        .await
    }

    async fn set_billing_cycle(
        &self,
        identity: &RequestIdentity,
        cycle: BillingCycle,
    ) -> Result<()> {
        self.handle(
            identity,
            RecordedCall::SetBillingCycle(cycle),
            context::SET_BILLING_CYCLE,
            |cart, _| {
                cart.billing_cycle = cycle;
                Ok(())
            },
        )
        .await
    }

    async fn add_plan(&self, identity: &RequestIdentity, plan_id: &str, quantity: u32) -> Result<()> {
        let call = RecordedCall::AddPlan {
            plan_id: plan_id.to_string(),
            quantity,
        };
        self.handle(identity, call, context::ADD_PLAN, |cart, catalog| {
            if catalog.is_some_and(|c| c.plan(plan_id).is_none()) {
                return Err("invalid plan ID".to_string());
            }
            let quantity = i64::from(quantity.max(1));
            match position(cart, plan_id) {
                Some(index) if cart.items[index].item_type == ItemKind::Plan => {
                    cart.items[index].quantity += quantity;
                }
                _ => cart
                    .items
                    .push(RemoteCartItem::new(plan_id, ItemKind::Plan, quantity)),
            }
            Ok(())
        })
        .await
    }

    async fn add_addon(
        &self,
        identity: &RequestIdentity,
        addon_id: &str,
        quantity: u32,
    ) -> Result<()> {
        let call = RecordedCall::AddAddon {
            addon_id: addon_id.to_string(),
            quantity,
        };
        let quantity = if self.single_addon_units { 1 } else { quantity };
        self.handle(identity, call, context::ADD_ADDON, |cart, catalog| {
            if catalog.is_some_and(|c| c.addon(addon_id).is_none()) {
                return Err("invalid addon ID".to_string());
            }
            let already_added = cart
                .items
                .iter()
                .any(|item| item.item_id == addon_id && item.item_type == ItemKind::Addon);
            if !already_added {
                cart.items.push(RemoteCartItem::new(
                    addon_id,
                    ItemKind::Addon,
                    i64::from(quantity.max(1)),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn update_quantity(
        &self,
        identity: &RequestIdentity,
        item_id: &str,
        quantity: u32,
    ) -> Result<()> {
        let call = RecordedCall::UpdateQuantity {
            item_id: item_id.to_string(),
            quantity,
        };
        self.handle(identity, call, context::UPDATE_QUANTITY, |cart, _| {
            if quantity == 0 {
                cart.items.retain(|item| item.item_id != item_id);
            } else if let Some(index) = position(cart, item_id) {
                cart.items[index].quantity = i64::from(quantity);
            }
            Ok(())
        })
        .await
    }

    async fn remove_item(&self, identity: &RequestIdentity, item_id: &str) -> Result<()> {
        let call = RecordedCall::RemoveItem {
            item_id: item_id.to_string(),
        };
        self.handle(identity, call, context::REMOVE_ITEM, |cart, _| {
            cart.items.retain(|item| item.item_id != item_id);
            Ok(())
        })
        .await
    }

    async fn checkout(
        &self,
        identity: &RequestIdentity,
        address_id: Option<&str>,
    ) -> Result<String> {
        let call = RecordedCall::Checkout {
            address_id: address_id.map(str::to_string),
        };
        let session_id = identity.session_id().to_string();
        let base = self.checkout_base.clone();
        self.handle(identity, call, context::CHECKOUT, move |cart, _| {
            if cart.items.is_empty() {
                return Err("cart is empty".to_string());
            }
            Ok(format!("{}/{}", base, session_id))
        })
        .await
    }
}
