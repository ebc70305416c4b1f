// ============================================================================
// Pricing Calculator
// ============================================================================
//
// Pure functions over catalog data and quantities. Plans billed yearly get
// two months free (pay 10, get 12); add-ons are billed the full 12 months.
// A catalog miss prices the line at zero instead of failing.
//
// ============================================================================

use crate::catalog::Catalog;
use crate::core::{BillingCycle, CartItem, CartState, ItemKind};
use rust_decimal::{Decimal, RoundingStrategy};

pub const MONTHS_PER_YEAR: u32 = 12;
pub const YEARLY_DISCOUNT_MONTHS: u32 = 2;

/// Months actually charged for a yearly term of the given item kind
pub fn billed_months(kind: ItemKind) -> u32 {
    match kind {
        ItemKind::Plan => MONTHS_PER_YEAR - YEARLY_DISCOUNT_MONTHS,
        ItemKind::Addon => MONTHS_PER_YEAR,
    }
}

/// Unit price from the catalog, zero when the item is no longer listed
pub fn catalog_unit_price(catalog: &Catalog, id: &str, kind: ItemKind) -> Decimal {
    catalog
        .lookup(id, kind)
        .map_or(Decimal::ZERO, |entry| entry.monthly_price())
}

pub fn monthly_price(catalog: &Catalog, item: &CartItem) -> Decimal {
    catalog_unit_price(catalog, &item.id, item.kind) * Decimal::from(item.quantity)
}

pub fn yearly_price(catalog: &Catalog, item: &CartItem) -> Decimal {
    catalog_unit_price(catalog, &item.id, item.kind)
        * Decimal::from(billed_months(item.kind))
        * Decimal::from(item.quantity)
}

pub fn item_price(catalog: &Catalog, item: &CartItem, cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Monthly => monthly_price(catalog, item),
        BillingCycle::Yearly => yearly_price(catalog, item),
    }
}

pub fn monthly_total(catalog: &Catalog, items: &[CartItem]) -> Decimal {
    items.iter().map(|item| monthly_price(catalog, item)).sum()
}

pub fn yearly_total(catalog: &Catalog, items: &[CartItem]) -> Decimal {
    items.iter().map(|item| yearly_price(catalog, item)).sum()
}

pub fn cart_total(catalog: &Catalog, items: &[CartItem], cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Monthly => monthly_total(catalog, items),
        BillingCycle::Yearly => yearly_total(catalog, items),
    }
}

/// What a yearly term saves over paying monthly for twelve months
pub fn yearly_savings(catalog: &Catalog, items: &[CartItem]) -> Decimal {
    monthly_total(catalog, items) * Decimal::from(MONTHS_PER_YEAR) - yearly_total(catalog, items)
}

/// Yearly price of a plan for a given monthly unit price
pub fn yearly_unit_price(monthly_unit: Decimal) -> Decimal {
    monthly_unit * Decimal::from(billed_months(ItemKind::Plan))
}

/// Effective per-month cost of a yearly plan, rounded to cents
pub fn yearly_monthly_equivalent(monthly_unit: Decimal) -> Decimal {
    round_cents(yearly_unit_price(monthly_unit) / Decimal::from(MONTHS_PER_YEAR))
}

pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Two-decimal euro display, e.g. `€9.90`
pub fn format_eur(amount: Decimal) -> String {
    format!("€{:.2}", round_cents(amount))
}

/// One display line of the cart
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub monthly: Decimal,
    pub yearly: Decimal,
    pub in_catalog: bool,
}

/// Everything the cart page needs to render totals
#[derive(Debug, Clone, PartialEq)]
pub struct CartSummary {
    pub lines: Vec<SummaryLine>,
    pub billing_cycle: BillingCycle,
    pub monthly_total: Decimal,
    pub yearly_total: Decimal,
    pub yearly_savings: Decimal,
}

impl CartSummary {
    pub fn build(cart: &CartState, catalog: &Catalog) -> Self {
        let lines = cart
            .items
            .iter()
            .map(|item| {
                let entry = catalog.lookup(&item.id, item.kind);
                SummaryLine {
                    id: item.id.clone(),
                    name: entry.map_or_else(|| item.id.clone(), |e| e.name().to_string()),
                    kind: item.kind,
                    quantity: item.quantity,
                    unit_price: catalog_unit_price(catalog, &item.id, item.kind),
                    monthly: monthly_price(catalog, item),
                    yearly: yearly_price(catalog, item),
                    in_catalog: entry.is_some(),
                }
            })
            .collect();

        Self {
            lines,
            billing_cycle: cart.billing_cycle,
            monthly_total: monthly_total(catalog, &cart.items),
            yearly_total: yearly_total(catalog, &cart.items),
            yearly_savings: yearly_savings(catalog, &cart.items),
        }
    }

    /// Total for the cart's active billing cycle
    pub fn total(&self) -> Decimal {
        match self.billing_cycle {
            BillingCycle::Monthly => self.monthly_total,
            BillingCycle::Yearly => self.yearly_total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
