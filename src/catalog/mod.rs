//! Static product catalog
//!
//! The catalog is a closed, immutable set of plans and add-ons. It is cheap to
//! clone (the maps sit behind `Arc`) so every component can hold its own copy
//! without locking.

use crate::core::{ItemKind, Result, StorefrontError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A hosting plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub monthly_price: Decimal,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub limits: String,
    #[serde(default)]
    pub features: Vec<String>,
}

/// An incidental add-on such as a domain registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub id: String,
    pub name: String,
    pub monthly_price: Decimal,
}

/// Result of a catalog lookup, independent of the item kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatalogEntry<'a> {
    Plan(&'a Plan),
    Addon(&'a Addon),
}

impl<'a> CatalogEntry<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            CatalogEntry::Plan(plan) => &plan.id,
            CatalogEntry::Addon(addon) => &addon.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            CatalogEntry::Plan(plan) => &plan.name,
            CatalogEntry::Addon(addon) => &addon.name,
        }
    }

    pub fn monthly_price(&self) -> Decimal {
        match self {
            CatalogEntry::Plan(plan) => plan.monthly_price,
            CatalogEntry::Addon(addon) => addon.monthly_price,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            CatalogEntry::Plan(_) => ItemKind::Plan,
            CatalogEntry::Addon(_) => ItemKind::Addon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    plans: Vec<Plan>,
    #[serde(default)]
    addons: Vec<Addon>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    plans: Arc<Vec<Plan>>,
    addons: Arc<Vec<Addon>>,
    plan_index: Arc<HashMap<String, usize>>,
    addon_index: Arc<HashMap<String, usize>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn new(plans: Vec<Plan>, addons: Vec<Addon>) -> Result<Self> {
        let mut plan_index = HashMap::with_capacity(plans.len());
        for (position, plan) in plans.iter().enumerate() {
            if plan_index.insert(plan.id.clone(), position).is_some() {
                return Err(StorefrontError::Config(format!(
                    "duplicate plan id '{}' in catalog",
                    plan.id
                )));
            }
        }

        let mut addon_index = HashMap::with_capacity(addons.len());
        for (position, addon) in addons.iter().enumerate() {
            if addon_index.insert(addon.id.clone(), position).is_some() {
                return Err(StorefrontError::Config(format!(
                    "duplicate addon id '{}' in catalog",
                    addon.id
                )));
            }
        }

        Ok(Self {
            plans: Arc::new(plans),
            addons: Arc::new(addons),
            plan_index: Arc::new(plan_index),
            addon_index: Arc::new(addon_index),
        })
    }

    /// Load `{ "plans": [...], "addons": [...] }`
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.plans, file.addons)
    }

    /// The storefront's shipped price list
    pub fn builtin() -> Self {
        let features = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };

        let plans = vec![
            Plan {
                id: "static-micro".to_string(),
                name: "Static Micro".to_string(),
                monthly_price: Decimal::new(390, 2),
                target_audience: "React/Vue SPAs".to_string(),
                limits: "Shared RAM, 1GB Storage".to_string(),
                features: features(&[
                    "Static site hosting",
                    "Shared resources",
                    "1GB NVMe storage",
                    "SSL included",
                    "German datacenter",
                ]),
            },
            Plan {
                id: "node-starter".to_string(),
                name: "Node Starter".to_string(),
                monthly_price: Decimal::new(990, 2),
                target_audience: "Personal Blogs".to_string(),
                limits: "1 vCPU (Shared), 512MB RAM, 5GB Storage".to_string(),
                features: features(&[
                    "Next.js / Nuxt support",
                    "High-Performance Burstable CPU",
                    "512MB RAM",
                    "5GB NVMe storage",
                    "SSL included",
                    "German datacenter",
                ]),
            },
            Plan {
                id: "node-pro".to_string(),
                name: "Node Pro".to_string(),
                monthly_price: Decimal::new(3990, 2),
                target_audience: "E-commerce/SaaS".to_string(),
                limits: "2 vCPU (Dedicated), 4GB RAM, 20GB Storage".to_string(),
                features: features(&[
                    "Next.js / Nuxt support",
                    "Dedicated Core Performance",
                    "4GB RAM",
                    "20GB NVMe storage",
                    "SSL included",
                    "German datacenter",
                    "Priority support",
                ]),
            },
        ];

        let addons = vec![Addon {
            id: "de-domain".to_string(),
            name: ".de Domain".to_string(),
            monthly_price: Decimal::new(100, 2),
        }];

        let plan_index = plans
            .iter()
            .enumerate()
            .map(|(position, plan)| (plan.id.clone(), position))
            .collect();
        let addon_index = addons
            .iter()
            .enumerate()
            .map(|(position, addon)| (addon.id.clone(), position))
            .collect();

        Self {
            plans: Arc::new(plans),
            addons: Arc::new(addons),
            plan_index: Arc::new(plan_index),
            addon_index: Arc::new(addon_index),
        }
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn addons(&self) -> &[Addon] {
        &self.addons
    }

    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.plan_index.get(id).map(|&position| &self.plans[position])
    }

    pub fn addon(&self, id: &str) -> Option<&Addon> {
        self.addon_index.get(id).map(|&position| &self.addons[position])
    }

    /// Look up an item by id within its kind. `None` means the item was
    /// dropped from the catalog; callers decide the fallback.
    pub fn lookup(&self, id: &str, kind: ItemKind) -> Option<CatalogEntry<'_>> {
        match kind {
            ItemKind::Plan => self.plan(id).map(CatalogEntry::Plan),
            ItemKind::Addon => self.addon(id).map(CatalogEntry::Addon),
        }
    }

    /// Find an id in either list, plans first
    pub fn find(&self, id: &str) -> Option<CatalogEntry<'_>> {
        self.lookup(id, ItemKind::Plan)
            .or_else(|| self.lookup(id, ItemKind::Addon))
    }

    /// Display name, falling back to the raw id on a catalog miss
    pub fn display_name<'a>(&'a self, id: &'a str, kind: ItemKind) -> &'a str {
        self.lookup(id, kind).map_or(id, |entry| entry.name())
    }
}
