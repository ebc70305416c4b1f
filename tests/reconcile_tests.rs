//! Reconciliation against the in-memory remote cart

use std::sync::Arc;
use std::time::Duration;

use storefront_cart::remote::{CartApi, InMemoryCartApi, RecordedCall, RemoteCartItem};
use storefront_cart::{BillingCycle, CartState, ItemKind, Reconciler, RequestIdentity, SyncPhase};

fn identity() -> RequestIdentity {
    RequestIdentity::Anonymous {
        session_id: "session-a".to_string(),
    }
}

fn reconciler(api: &Arc<InMemoryCartApi>) -> Reconciler {
    Reconciler::new(api.clone(), Duration::from_secs(1))
}

fn sorted(mut items: Vec<RemoteCartItem>) -> Vec<RemoteCartItem> {
    items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    items
}

fn as_remote(cart: &CartState) -> Vec<RemoteCartItem> {
    sorted(
        cart.items
            .iter()
            .map(|item| RemoteCartItem::new(item.id.clone(), item.kind, i64::from(item.quantity)))
            .collect(),
    )
}

/// Small deterministic generator so the property runs are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

const IDS: [(&str, ItemKind); 5] = [
    ("static-micro", ItemKind::Plan),
    ("node-starter", ItemKind::Plan),
    ("node-pro", ItemKind::Plan),
    ("de-domain", ItemKind::Addon),
    ("backup", ItemKind::Addon),
];

fn random_cart(rng: &mut Lcg) -> CartState {
    let mut cart = CartState::new();
    for _ in 0..rng.next(8) {
        let (id, kind) = IDS[rng.next(IDS.len() as u64) as usize];
        match rng.next(3) {
            0 | 1 => cart.add_item(id, kind),
            _ => cart.set_quantity(id, rng.next(4) as i64),
        }
    }
    if rng.next(2) == 0 {
        cart.billing_cycle = BillingCycle::Yearly;
    }
    cart
}

fn random_remote(rng: &mut Lcg) -> Vec<RemoteCartItem> {
    let mut items: Vec<RemoteCartItem> = Vec::new();
    for (id, kind) in IDS {
        if rng.next(2) == 0 {
            items.push(RemoteCartItem::new(id, kind, rng.next(3) as i64 + 1));
        }
    }
    items
}

#[tokio::test]
async fn test_local_is_truth_convergence() {
    let api = Arc::new(InMemoryCartApi::new());
    api.seed(
        "session-a",
        vec![
            RemoteCartItem::new("node-pro", ItemKind::Plan, 2),
            RemoteCartItem::new("static-micro", ItemKind::Plan, 1),
        ],
        BillingCycle::Monthly,
    );

    let mut local = CartState::new();
    local.add_item("node-pro", ItemKind::Plan);
    local.set_quantity("node-pro", 3);
    local.add_item("de-domain", ItemKind::Addon);

    reconciler(&api).reconcile(&local, &identity()).await.unwrap();

    assert_eq!(
        api.mutating_calls(),
        vec![
            RecordedCall::SetBillingCycle(BillingCycle::Monthly),
            RecordedCall::UpdateQuantity {
                item_id: "node-pro".to_string(),
                quantity: 3
            },
            RecordedCall::AddAddon {
                addon_id: "de-domain".to_string(),
                quantity: 1
            },
            RecordedCall::RemoveItem {
                item_id: "static-micro".to_string()
            },
        ]
    );
    assert_eq!(sorted(api.cart("session-a").items), as_remote(&local));
}

#[tokio::test]
async fn test_second_run_issues_no_item_calls() {
    let api = Arc::new(InMemoryCartApi::new());
    let reconciler = reconciler(&api);

    let mut local = CartState::new();
    local.add_item("node-starter", ItemKind::Plan);
    local.add_item("de-domain", ItemKind::Addon);
    local.billing_cycle = BillingCycle::Yearly;

    reconciler.reconcile(&local, &identity()).await.unwrap();
    api.clear_calls();

    let report = reconciler.reconcile(&local, &identity()).await.unwrap();
    assert_eq!(report.item_mutation_count(), 0);
    assert!(report.plan.is_converged());
    assert!(!api.calls().iter().any(RecordedCall::is_item_mutation));
}

#[tokio::test]
async fn test_random_carts_converge_and_stay_converged() {
    let mut rng = Lcg(7);

    for round in 0..64 {
        let api = Arc::new(InMemoryCartApi::new());
        api.seed("session-a", random_remote(&mut rng), BillingCycle::Monthly);
        let local = random_cart(&mut rng);
        let reconciler = reconciler(&api);

        reconciler.reconcile(&local, &identity()).await.unwrap();
        let remote = api.cart("session-a");
        assert_eq!(sorted(remote.items), as_remote(&local), "round {}", round);
        assert_eq!(remote.billing_cycle, Some(local.billing_cycle), "round {}", round);

        api.clear_calls();
        let report = reconciler.reconcile(&local, &identity()).await.unwrap();
        assert_eq!(report.item_mutation_count(), 0, "round {}", round);
    }
}

#[tokio::test]
async fn test_failure_aborts_then_retry_converges() {
    let api = Arc::new(InMemoryCartApi::new());
    api.seed(
        "session-a",
        vec![
            RemoteCartItem::new("static-micro", ItemKind::Plan, 1),
            RemoteCartItem::new("backup", ItemKind::Addon, 1),
        ],
        BillingCycle::Monthly,
    );
    let reconciler = reconciler(&api);

    let mut local = CartState::new();
    local.add_item("node-pro", ItemKind::Plan);
    local.add_item("de-domain", ItemKind::Addon);

    api.fail_when(
        |call| matches!(call, RecordedCall::AddAddon { .. }),
        "addon service unavailable",
    );
    let err = reconciler.reconcile(&local, &identity()).await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to add addon: addon service unavailable");
    assert!(matches!(reconciler.phase(), SyncPhase::Failed(_)));

    // Aborted before the removals: nothing after the failing call was issued
    assert!(!api
        .calls()
        .iter()
        .any(|call| matches!(call, RecordedCall::RemoveItem { .. })));

    api.clear_failure();
    reconciler.reconcile(&local, &identity()).await.unwrap();
    assert_eq!(sorted(api.cart("session-a").items), as_remote(&local));
    assert_eq!(reconciler.phase(), SyncPhase::Synced);
}

#[tokio::test]
async fn test_reconcile_never_touches_local_cart() {
    let api = Arc::new(InMemoryCartApi::new());
    api.seed(
        "session-a",
        vec![RemoteCartItem::new("node-pro", ItemKind::Plan, 5)],
        BillingCycle::Yearly,
    );

    let local = CartState::new();
    let before = local.clone();
    reconciler(&api).reconcile(&local, &identity()).await.unwrap();

    assert_eq!(local, before);
    assert!(api.fetch_cart(&identity()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_addon_quantity_converges_on_second_run_against_backend_rules() {
    let api = Arc::new(InMemoryCartApi::new().with_single_addon_units());
    let reconciler = reconciler(&api);

    let mut local = CartState::new();
    local.add_item("de-domain", ItemKind::Addon);
    local.add_item("de-domain", ItemKind::Addon);

    reconciler.reconcile(&local, &identity()).await.unwrap();
    assert_eq!(
        api.cart("session-a").items,
        vec![RemoteCartItem::new("de-domain", ItemKind::Addon, 1)]
    );

    let report = reconciler.reconcile(&local, &identity()).await.unwrap();
    assert_eq!(report.item_mutation_count(), 1);
    assert_eq!(sorted(api.cart("session-a").items), as_remote(&local));

    let report = reconciler.reconcile(&local, &identity()).await.unwrap();
    assert_eq!(report.item_mutation_count(), 0);
}
