// ============================================================================
// Cart Store
// ============================================================================
//
// Owns the single mutable local cart. Every mutation runs synchronously and,
// in this order: applies the change, writes the snapshot to durable storage,
// then notifies subscribers. Storage failures are logged and never undo the
// in-memory change.
//
// ============================================================================

use crate::core::{BillingCycle, CartItem, CartState, ItemKind, Result};
use crate::storage::{KeyValueStore, StorageKeys};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk envelope around the cart state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub cart: CartState,
}

impl PersistedCart {
    pub fn new(cart: CartState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            cart,
        }
    }
}

/// What `load` found in storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was saved yet
    Missing,
    Restored { items: usize },
    /// Stored data could not be decoded; the cart was reset to empty and
    /// the empty cart written back
    Corrupt { reason: String },
    /// Storage itself failed; the cart starts empty but storage is untouched
    Unreadable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&CartState) + Send + Sync>;

pub struct CartStore {
    state: RwLock<CartState>,
    storage: Arc<dyn KeyValueStore>,
    storage_key: String,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl CartStore {
    /// Create an empty store without touching storage
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: &StorageKeys) -> Self {
        Self {
            state: RwLock::new(CartState::new()),
            storage,
            storage_key: keys.cart.clone(),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Create a store and restore whatever was persisted
    pub fn open(storage: Arc<dyn KeyValueStore>, keys: &StorageKeys) -> Self {
        let store = Self::new(storage, keys);
        store.load();
        store
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> CartState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn billing_cycle(&self) -> BillingCycle {
        self.state.read().unwrap_or_else(PoisonError::into_inner).billing_cycle
    }

    pub fn has_items(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).has_items()
    }

    pub fn item_count(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).item_count()
    }

    pub fn get_item(&self, id: &str) -> Option<CartItem> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_item(id)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn add_item(&self, id: &str, kind: ItemKind) {
        debug!("cart: add {} '{}'", kind, id);
        self.mutate(|cart| cart.add_item(id, kind));
    }

    pub fn set_quantity(&self, id: &str, quantity: i64) {
        debug!("cart: set quantity of '{}' to {}", id, quantity);
        self.mutate(|cart| cart.set_quantity(id, quantity));
    }

    pub fn remove_item(&self, id: &str) {
        debug!("cart: remove '{}'", id);
        self.mutate(|cart| cart.remove_item(id));
    }

    pub fn set_billing_cycle(&self, cycle: BillingCycle) {
        debug!("cart: billing cycle {}", cycle);
        self.mutate(|cart| cart.billing_cycle = cycle);
    }

    /// Single-plan shortcut: the cart ends up with exactly this plan
    pub fn select_plan(&self, plan_id: &str) {
        debug!("cart: select plan '{}'", plan_id);
        self.mutate(|cart| cart.select_plan(plan_id));
    }

    pub fn clear_plan(&self) {
        self.mutate(CartState::clear_plan);
    }

    pub fn clear(&self) {
        debug!("cart: clear");
        self.mutate(|cart| *cart = CartState::new());
    }

    fn mutate<F>(&self, change: F)
    where
        F: FnOnce(&mut CartState),
    {
        // The write lock spans the storage write so snapshots land in
        // mutation order
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            change(&mut state);
            let snapshot = state.clone();
            if let Err(err) = self.write_snapshot(&snapshot) {
                warn!("Failed to persist cart: {}", err);
            }
            snapshot
        };

        self.notify(&snapshot);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save the current cart to durable storage
    pub fn persist(&self) -> Result<()> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        self.write_snapshot(&state)
    }

    fn write_snapshot(&self, cart: &CartState) -> Result<()> {
        let encoded = serde_json::to_string(&PersistedCart::new(cart.clone()))?;
        self.storage.set(&self.storage_key, &encoded)
    }

    /// Restore the cart from durable storage. Never fails: unreadable data
    /// resets the cart to empty and is reported in the outcome.
    pub fn load(&self) -> LoadOutcome {
        let raw = match self.storage.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No saved cart found in storage");
                return LoadOutcome::Missing;
            }
            Err(err) => return self.reset_unreadable(err.to_string()),
        };

        let restored = serde_json::from_str::<PersistedCart>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|persisted| {
                if persisted.version != SNAPSHOT_VERSION {
                    return Err(format!("unsupported snapshot version {}", persisted.version));
                }
                persisted.cart.validate()?;
                Ok(persisted.cart)
            });

        match restored {
            Ok(cart) => {
                let items = cart.items.len();
                debug!("Restoring cart from storage ({} items)", items);
                *self.state.write().unwrap_or_else(PoisonError::into_inner) = cart.clone();
                self.notify(&cart);
                LoadOutcome::Restored { items }
            }
            Err(reason) => self.reset_corrupt(reason),
        }
    }

    /// Storage could not be read at all. The stored value may still be
    /// valid, so only the in-memory cart is reset.
    fn reset_unreadable(&self, reason: String) -> LoadOutcome {
        warn!("Failed to read saved cart, starting empty: {}", reason);
        let empty = CartState::new();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = empty.clone();
        self.notify(&empty);
        LoadOutcome::Unreadable { reason }
    }

    fn reset_corrupt(&self, reason: String) -> LoadOutcome {
        warn!("Failed to restore cart, starting empty: {}", reason);
        self.mutate(|cart| *cart = CartState::new());
        LoadOutcome::Corrupt { reason }
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, cart: &CartState) {
        // Listeners run outside the lock so they may read the store or subscribe
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(cart);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::atomic::AtomicUsize;

    fn store_with(storage: Arc<MemoryStore>) -> CartStore {
        CartStore::new(storage, &StorageKeys::default())
    }

    #[test]
    fn test_mutation_persists_before_notify() {
        let storage = Arc::new(MemoryStore::new());
        let store = store_with(storage.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_in_listener = seen.clone();
        let storage_in_listener = storage.clone();
        store.subscribe(move |cart| {
            let persisted = storage_in_listener
                .get(&StorageKeys::default().cart)
                .unwrap()
                .unwrap();
            let persisted: PersistedCart = serde_json::from_str(&persisted).unwrap();
            assert_eq!(&persisted.cart, cart);
            seen_in_listener.lock().unwrap().push(cart.item_count());
        });

        store.add_item("node-pro", ItemKind::Plan);
        store.add_item("node-pro", ItemKind::Plan);
        store.set_quantity("node-pro", 5);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 5]);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = store_with(Arc::new(MemoryStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let id = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.add_item("de-domain", ItemKind::Addon);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add_item("de-domain", ItemKind::Addon);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_empties_cart() {
        let store = store_with(Arc::new(MemoryStore::new()));
        store.add_item("node-pro", ItemKind::Plan);
        store.set_billing_cycle(BillingCycle::Yearly);

        store.clear();

        assert!(!store.has_items());
        assert_eq!(store.item_count(), 0);
        assert_eq!(store.billing_cycle(), BillingCycle::Monthly);
    }

    #[test]
    fn test_load_restores_and_notifies() {
        let storage = Arc::new(MemoryStore::new());
        {
            let first = store_with(storage.clone());
            first.add_item("node-starter", ItemKind::Plan);
            first.set_billing_cycle(BillingCycle::Yearly);
        }

        let second = store_with(storage);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        second.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(second.load(), LoadOutcome::Restored { items: 1 });
        assert_eq!(second.billing_cycle(), BillingCycle::Yearly);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_corrupt_falls_back_to_empty() {
        let keys = StorageKeys::default();
        let storage = Arc::new(MemoryStore::new().with_value(&keys.cart, "{not json"));
        let store = CartStore::new(storage.clone(), &keys);

        assert!(matches!(store.load(), LoadOutcome::Corrupt { .. }));
        assert!(!store.has_items());

        // The corrupt blob is replaced by a readable empty cart
        assert_eq!(store.load(), LoadOutcome::Restored { items: 0 });
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let keys = StorageKeys::default();
        let payload = serde_json::json!({
            "version": 1,
            "savedAt": "2025-01-01T00:00:00Z",
            "cart": {
                "items": [
                    { "id": "a", "type": "plan", "quantity": 1 },
                    { "id": "a", "type": "plan", "quantity": 1 }
                ],
                "billingCycle": "monthly"
            }
        });
        let storage = Arc::new(MemoryStore::new().with_value(&keys.cart, &payload.to_string()));
        let store = CartStore::new(storage, &keys);

        assert!(matches!(store.load(), LoadOutcome::Corrupt { .. }));
        assert!(!store.has_items());
    }

    #[test]
    fn test_read_failure_leaves_saved_cart_alone() {
        let keys = StorageKeys::default();
        let storage = Arc::new(MemoryStore::new());
        {
            let first = store_with(storage.clone());
            first.add_item("node-pro", ItemKind::Plan);
        }
        let saved = storage.get(&keys.cart).unwrap();

        storage.set_reject_reads(true);
        let store = store_with(storage.clone());
        assert!(matches!(store.load(), LoadOutcome::Unreadable { .. }));
        assert!(!store.has_items());

        storage.set_reject_reads(false);
        assert_eq!(storage.get(&keys.cart).unwrap(), saved);
        assert_eq!(store.load(), LoadOutcome::Restored { items: 1 });
    }

    #[test]
    fn test_write_failure_keeps_in_memory_change() {
        let storage = Arc::new(MemoryStore::new());
        storage.set_reject_writes(true);
        let store = store_with(storage.clone());

        store.add_item("node-pro", ItemKind::Plan);

        assert_eq!(store.item_count(), 1);
        assert!(store.persist().is_err());
        storage.set_reject_writes(false);
        assert!(store.persist().is_ok());
    }
}
