use super::{CartMutation, ReconcilePlan};
use crate::core::{CartState, Result, StorefrontError};
use crate::remote::{CartApi, context};
use crate::session::RequestIdentity;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Where the last reconciliation run stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    Synced,
    Failed(String),
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub plan: ReconcilePlan,
    pub applied: Vec<CartMutation>,
}

impl ReconcileReport {
    /// Line-item calls issued (billing cycle excluded)
    pub fn item_mutation_count(&self) -> usize {
        self.applied.iter().filter(|m| m.is_item_mutation()).count()
    }
}

/// Resets the phase to `Idle` when a run is dropped before finishing
struct RunGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
    finished: bool,
}

impl<'a> RunGuard<'a> {
    fn start(phase: &'a Mutex<SyncPhase>) -> Self {
        *phase.lock().unwrap_or_else(PoisonError::into_inner) = SyncPhase::Syncing;
        Self {
            phase,
            finished: false,
        }
    }

    fn finish(mut self, phase: SyncPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
        self.finished = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = SyncPhase::Idle;
        }
    }
}

/// Drives the remote cart to match the local cart, then hands off to checkout
///
/// Calls are issued strictly one after another against a single pre-fetched
/// snapshot. A second run while one is in flight is rejected with `Busy`.
/// The local cart is only read; nothing here writes back into it.
pub struct Reconciler {
    api: Arc<dyn CartApi>,
    request_timeout: Duration,
    run_lock: tokio::sync::Mutex<()>,
    phase: Mutex<SyncPhase>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn CartApi>, request_timeout: Duration) -> Self {
        Self {
            api,
            request_timeout,
            run_lock: tokio::sync::Mutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn api(&self) -> &Arc<dyn CartApi> {
        &self.api
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.phase() == SyncPhase::Syncing
    }

    /// Converge the remote cart to `local`
    pub async fn reconcile(
        &self,
        local: &CartState,
        identity: &RequestIdentity,
    ) -> Result<ReconcileReport> {
        let _run = self.run_lock.try_lock().map_err(|_| StorefrontError::Busy)?;
        self.tracked_run(local, identity).await
    }

    /// Converge, then create the payment session. Returns the redirect URL.
    pub async fn reconcile_and_checkout(
        &self,
        local: &CartState,
        identity: &RequestIdentity,
        address_id: Option<&str>,
    ) -> Result<String> {
        let _run = self.run_lock.try_lock().map_err(|_| StorefrontError::Busy)?;
        self.tracked_run(local, identity).await?;
        self.checkout_locked(identity, address_id).await
    }

    /// Create the payment session without reconciling first. The caller is
    /// responsible for having converged the remote cart.
    pub async fn checkout(
        &self,
        identity: &RequestIdentity,
        address_id: Option<&str>,
    ) -> Result<String> {
        let _run = self.run_lock.try_lock().map_err(|_| StorefrontError::Busy)?;
        self.checkout_locked(identity, address_id).await
    }

    async fn checkout_locked(
        &self,
        identity: &RequestIdentity,
        address_id: Option<&str>,
    ) -> Result<String> {
        let url = self
            .bounded(context::CHECKOUT, self.api.checkout(identity, address_id))
            .await?;
        info!("Checkout session created for cart session {}", identity.session_id());
        Ok(url)
    }

    async fn tracked_run(
        &self,
        local: &CartState,
        identity: &RequestIdentity,
    ) -> Result<ReconcileReport> {
        let guard = RunGuard::start(&self.phase);
        match self.run(local, identity).await {
            Ok(report) => {
                guard.finish(SyncPhase::Synced);
                Ok(report)
            }
            Err(err) => {
                guard.finish(SyncPhase::Failed(err.user_message()));
                Err(err)
            }
        }
    }

    async fn run(&self, local: &CartState, identity: &RequestIdentity) -> Result<ReconcileReport> {
        let remote = self
            .bounded(context::FETCH_CART, self.api.fetch_cart(identity))
            .await?;
        let plan = ReconcilePlan::diff(local, &remote);
        debug!(
            "Reconciling cart session {}: {} remote items, {} item mutations",
            identity.session_id(),
            remote.items.len(),
            plan.item_mutation_count()
        );

        let mut applied = Vec::with_capacity(plan.len());
        for mutation in plan.mutations() {
            if let Err(err) = self.apply(mutation, identity).await {
                warn!(
                    "Reconciliation aborted at '{}' after {} of {} calls: {}",
                    mutation,
                    applied.len(),
                    plan.len(),
                    err
                );
                return Err(err);
            }
            applied.push(mutation.clone());
        }

        info!(
            "Cart session {} reconciled ({} item mutations)",
            identity.session_id(),
            plan.item_mutation_count()
        );
        Ok(ReconcileReport { plan, applied })
    }

    async fn apply(&self, mutation: &CartMutation, identity: &RequestIdentity) -> Result<()> {
        debug!("cart sync: {}", mutation);
        let api = &self.api;
        let ctx = mutation.context();
        match mutation {
            CartMutation::SetBillingCycle(cycle) => {
                self.bounded(ctx, api.set_billing_cycle(identity, *cycle)).await
            }
            CartMutation::AddPlan { plan_id, quantity } => {
                self.bounded(ctx, api.add_plan(identity, plan_id, *quantity)).await
            }
            CartMutation::AddAddon { addon_id, quantity } => {
                self.bounded(ctx, api.add_addon(identity, addon_id, *quantity)).await
            }
            CartMutation::UpdateQuantity {
                item_id, quantity, ..
            } => {
                self.bounded(ctx, api.update_quantity(identity, item_id, *quantity))
                    .await
            }
            CartMutation::RemoveItem { item_id } => {
                self.bounded(ctx, api.remove_item(identity, item_id)).await
            }
        }
    }

    async fn bounded<T, F>(&self, context: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| StorefrontError::Timeout { context })?
    }
}
