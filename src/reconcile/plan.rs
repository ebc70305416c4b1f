// ============================================================================
// Reconciliation Plan
// ============================================================================
//
// Pure diff between the local cart and one remote snapshot. Each mutation is
// a single remote call; applying the whole plan in order drives the remote
// cart to match the local one.
//
// ============================================================================

use crate::core::{BillingCycle, CartItem, CartState, ItemKind};
use crate::remote::{RemoteCartSnapshot, context};
use std::collections::HashSet;
use std::fmt;

/// One corrective remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartMutation {
    SetBillingCycle(BillingCycle),

    /// Add a plan the remote does not have, at the absolute local quantity
    AddPlan { plan_id: String, quantity: u32 },

    /// Add an add-on the remote does not have, at the absolute local quantity
    AddAddon { addon_id: String, quantity: u32 },

    UpdateQuantity {
        item_id: String,
        remote_quantity: i64,
        quantity: u32,
    },

    RemoveItem { item_id: String },
}

impl CartMutation {
    fn add(item: &CartItem) -> Self {
        match item.kind {
            ItemKind::Plan => CartMutation::AddPlan {
                plan_id: item.id.clone(),
                quantity: item.quantity,
            },
            ItemKind::Addon => CartMutation::AddAddon {
                addon_id: item.id.clone(),
                quantity: item.quantity,
            },
        }
    }

    /// The line item this mutation touches, `None` for the billing cycle
    pub fn item_id(&self) -> Option<&str> {
        match self {
            CartMutation::SetBillingCycle(_) => None,
            CartMutation::AddPlan { plan_id, .. } => Some(plan_id),
            CartMutation::AddAddon { addon_id, .. } => Some(addon_id),
            CartMutation::UpdateQuantity { item_id, .. } => Some(item_id),
            CartMutation::RemoveItem { item_id } => Some(item_id),
        }
    }

    pub fn is_item_mutation(&self) -> bool {
        !matches!(self, CartMutation::SetBillingCycle(_))
    }

    /// Error context used when this call fails
    pub fn context(&self) -> &'static str {
        match self {
            CartMutation::SetBillingCycle(_) => context::SET_BILLING_CYCLE,
            CartMutation::AddPlan { .. } => context::ADD_PLAN,
            CartMutation::AddAddon { .. } => context::ADD_ADDON,
            CartMutation::UpdateQuantity { .. } => context::UPDATE_QUANTITY,
            CartMutation::RemoveItem { .. } => context::REMOVE_ITEM,
        }
    }
}

impl fmt::Display for CartMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartMutation::SetBillingCycle(cycle) => write!(f, "set billing cycle {}", cycle),
            CartMutation::AddPlan { plan_id, quantity } => {
                write!(f, "add plan {} x{}", plan_id, quantity)
            }
            CartMutation::AddAddon { addon_id, quantity } => {
                write!(f, "add addon {} x{}", addon_id, quantity)
            }
            CartMutation::UpdateQuantity {
                item_id,
                remote_quantity,
                quantity,
            } => write!(f, "update {} {} -> {}", item_id, remote_quantity, quantity),
            CartMutation::RemoveItem { item_id } => write!(f, "remove {}", item_id),
        }
    }
}

/// Ordered mutations for one reconciliation run
///
/// Order: billing cycle first, then adds/updates in local cart order, then
/// removals of remote-only items in remote order. Adds and updates are
/// decided against the snapshot the plan was built from; it is never
/// refreshed while the plan is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    mutations: Vec<CartMutation>,
    cycle_changed: bool,
}

impl ReconcilePlan {
    pub fn diff(local: &CartState, remote: &RemoteCartSnapshot) -> Self {
        let mut mutations = vec![CartMutation::SetBillingCycle(local.billing_cycle)];

        for item in &local.items {
            match remote.get(&item.id) {
                // Same id under the other kind: the remote line cannot be
                // retyped in place, so replace it
                Some(existing) if existing.item_type != item.kind => {
                    mutations.push(CartMutation::RemoveItem {
                        item_id: item.id.clone(),
                    });
                    mutations.push(CartMutation::add(item));
                }
                Some(existing) if existing.quantity != i64::from(item.quantity) => {
                    mutations.push(CartMutation::UpdateQuantity {
                        item_id: item.id.clone(),
                        remote_quantity: existing.quantity,
                        quantity: item.quantity,
                    });
                }
                Some(_) => {}
                None => mutations.push(CartMutation::add(item)),
            }
        }

        let local_ids: HashSet<&str> = local.items.iter().map(|item| item.id.as_str()).collect();
        let mut removed: HashSet<&str> = HashSet::new();
        for remote_item in &remote.items {
            let id = remote_item.item_id.as_str();
            if !local_ids.contains(id) && removed.insert(id) {
                mutations.push(CartMutation::RemoveItem {
                    item_id: remote_item.item_id.clone(),
                });
            }
        }

        Self {
            mutations,
            cycle_changed: remote.billing_cycle != Some(local.billing_cycle),
        }
    }

    pub fn mutations(&self) -> &[CartMutation] {
        &self.mutations
    }

    pub fn item_mutations(&self) -> impl Iterator<Item = &CartMutation> {
        self.mutations.iter().filter(|m| m.is_item_mutation())
    }

    pub fn item_mutation_count(&self) -> usize {
        self.item_mutations().count()
    }

    /// Whether the remote billing cycle differed from the local one
    pub fn cycle_changed(&self) -> bool {
        self.cycle_changed
    }

    /// The remote already matches: only the idempotent cycle call remains
    pub fn is_converged(&self) -> bool {
        !self.cycle_changed && self.item_mutation_count() == 0
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
