use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a cart line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Plan,
    Addon,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Plan => "plan",
            ItemKind::Addon => "addon",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plan" => Ok(ItemKind::Plan),
            "addon" | "add-on" => Ok(ItemKind::Addon),
            other => Err(format!("unknown item type '{}'", other)),
        }
    }
}

/// Payment cadence of the whole cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" | "annual" => Ok(BillingCycle::Yearly),
            other => Err(format!("unknown billing cycle '{}'", other)),
        }
    }
}

/// A single line in the local cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, quantity: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            quantity,
        }
    }

    pub fn is_plan(&self) -> bool {
        self.kind == ItemKind::Plan
    }
}

/// The authoritative local cart
///
/// Items keep insertion order for stable display. At most one item per `id`;
/// every quantity is at least 1. All mutation helpers preserve both rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub billing_cycle: BillingCycle,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_item(id).is_some()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Sum of all line quantities
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn plans(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(|item| item.kind == ItemKind::Plan)
    }

    pub fn addons(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter().filter(|item| item.kind == ItemKind::Addon)
    }

    /// Increment an existing line or append a new one with quantity 1
    pub fn add_item(&mut self, id: &str, kind: ItemKind) {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(1),
            None => self.items.push(CartItem::new(id, kind, 1)),
        }
    }

    /// Set the quantity of an existing line; `quantity <= 0` removes it
    pub fn set_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(existing) = self.items.iter_mut().find(|item| item.id == id) {
            existing.quantity = quantity;
        }
    }

    pub fn remove_item(&mut self, id: &str) {
        self.items.retain(|item| item.id != id);
    }

    /// Replace every plan line with a single line of `plan_id`
    pub fn select_plan(&mut self, plan_id: &str) {
        let position = self.items.iter().position(|item| item.is_plan());
        self.items.retain(|item| !item.is_plan());

        let line = CartItem::new(plan_id, ItemKind::Plan, 1);
        match position {
            Some(index) => self.items.insert(index.min(self.items.len()), line),
            None => self.items.insert(0, line),
        }
    }

    pub fn clear_plan(&mut self) {
        self.items.retain(|item| !item.is_plan());
    }

    /// Check the uniqueness and quantity rules on data that did not come
    /// through the mutation helpers (e.g. restored from storage)
    pub fn validate(&self) -> Result<(), String> {
        for (index, item) in self.items.iter().enumerate() {
            if item.id.is_empty() {
                return Err(format!("item at position {} has an empty id", index));
            }
            if item.quantity == 0 {
                return Err(format!("item '{}' has quantity 0", item.id));
            }
            if self.items[..index].iter().any(|other| other.id == item.id) {
                return Err(format!("duplicate item id '{}'", item.id));
            }
        }
        Ok(())
    }
}
