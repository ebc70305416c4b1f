//! Cart store invariants and on-disk persistence

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use storefront_cart::store::{CartStore, LoadOutcome, PersistedCart};
use storefront_cart::{
    BillingCycle, FileStore, ItemKind, KeyValueStore, MemoryStore, SessionIdentity, StorageKeys,
};
use tempfile::TempDir;

fn memory_store() -> (CartStore, Arc<MemoryStore>) {
    let storage = Arc::new(MemoryStore::new());
    let store = CartStore::new(storage.clone(), &StorageKeys::default());
    (store, storage)
}

#[test]
fn test_ids_stay_unique_across_operation_sequences() {
    let (store, _) = memory_store();
    let ids = ["node-pro", "node-starter", "de-domain"];
    let mut seed: u64 = 11;

    for _ in 0..500 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let id = ids[(seed >> 40) as usize % ids.len()];
        match (seed >> 20) % 4 {
            0 => store.add_item(id, ItemKind::Plan),
            1 => store.set_quantity(id, ((seed >> 8) % 5) as i64 - 1),
            2 => store.remove_item(id),
            _ => store.add_item(id, ItemKind::Plan),
        }

        let cart = store.snapshot();
        let unique: HashSet<&str> = cart.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(unique.len(), cart.items.len());
        assert!(cart.items.iter().all(|i| i.quantity >= 1));
    }
}

#[test]
fn test_cart_survives_restart_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let keys = StorageKeys::default();

    {
        let storage = Arc::new(FileStore::new(temp_dir.path()).unwrap());
        let store = CartStore::open(storage, &keys);
        store.add_item("node-starter", ItemKind::Plan);
        store.set_quantity("node-starter", 2);
        store.add_item("de-domain", ItemKind::Addon);
        store.set_billing_cycle(BillingCycle::Yearly);
    }

    assert!(temp_dir.path().join("storefront_cart.json").exists());

    let storage = Arc::new(FileStore::new(temp_dir.path()).unwrap());
    let store = CartStore::new(storage, &keys);
    assert_eq!(store.load(), LoadOutcome::Restored { items: 2 });
    assert_eq!(store.item_count(), 3);
    assert_eq!(store.billing_cycle(), BillingCycle::Yearly);
}

#[test]
fn test_corrupt_file_resets_to_empty_cart() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("storefront_cart.json"), "{ not json").unwrap();

    let storage = Arc::new(FileStore::new(temp_dir.path()).unwrap());
    let store = CartStore::new(storage.clone(), &StorageKeys::default());

    assert!(matches!(store.load(), LoadOutcome::Corrupt { .. }));
    assert!(!store.has_items());

    // The reset cart replaced the unreadable data
    let reopened = CartStore::new(storage, &StorageKeys::default());
    assert_eq!(reopened.load(), LoadOutcome::Restored { items: 0 });
}

#[test]
fn test_session_id_is_reused_until_cleared() {
    let temp_dir = TempDir::new().unwrap();
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(temp_dir.path()).unwrap());

    let first = SessionIdentity::new(storage.clone(), StorageKeys::default()).get_or_create_session_id();
    let session = SessionIdentity::new(storage.clone(), StorageKeys::default());
    assert_eq!(session.get_or_create_session_id(), first);
    assert_eq!(session.get_or_create_session_id(), first);

    session.clear_session_id().unwrap();
    assert_eq!(storage.get("storefront_session_id").unwrap(), None);
    let second = session.get_or_create_session_id();
    assert_ne!(second, first);
    assert_eq!(second.len(), 36);
}

#[test]
fn test_concurrent_mutations_persist_latest_cart() {
    let ids = ["node-pro", "node-starter", "static-micro", "de-domain"];

    for _ in 0..50 {
        let storage = Arc::new(MemoryStore::new());
        let store = Arc::new(CartStore::new(storage.clone(), &StorageKeys::default()));

        let workers: Vec<_> = ids
            .iter()
            .map(|id| {
                let store = Arc::clone(&store);
                let id = id.to_string();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.add_item(&id, ItemKind::Plan);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let raw = storage.get("storefront_cart").unwrap().unwrap();
        let persisted: PersistedCart = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.cart, store.snapshot());
        assert_eq!(store.item_count(), 200);
    }
}
