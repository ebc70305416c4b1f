// ============================================================================
// Storefront Cart Library
// ============================================================================

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod core;
pub mod pricing;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use catalog::Catalog;
pub use checkout::{AddressForm, CheckoutOutcome, CheckoutRequest, ValidAddress};
pub use config::StorefrontConfig;
pub use crate::core::{BillingCycle, CartItem, CartState, ItemKind, Result, StorefrontError, ValidationError};
pub use pricing::CartSummary;
pub use reconcile::{ReconcileReport, Reconciler, SyncPhase};
pub use remote::{CartApi, HttpCartApi, InMemoryCartApi};
pub use session::{RequestIdentity, SessionIdentity};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageKeys};
pub use store::CartStore;

use log::info;
use std::sync::Arc;

// ============================================================================
// High-level Storefront API
// ============================================================================

/// Client-side storefront: local cart, anonymous session and remote sync
///
/// This is the recommended entry point. The cart is mutated through
/// [`Storefront::store`]; nothing touches the network until [`Storefront::sync`]
/// or [`Storefront::checkout`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use storefront_cart::{InMemoryCartApi, ItemKind, MemoryStore, Storefront, StorefrontConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = Arc::new(InMemoryCartApi::new());
/// let storefront = Storefront::with_parts(
///     Arc::new(MemoryStore::new()),
///     api,
///     StorefrontConfig::default(),
/// );
///
/// storefront.store().add_item("node-pro", ItemKind::Plan);
/// storefront.sync().await?;
/// println!("Total: {}", storefront.summary().total());
/// # Ok(())
/// # }
/// ```
pub struct Storefront {
    config: StorefrontConfig,
    store: Arc<CartStore>,
    session: SessionIdentity,
    reconciler: Reconciler,
    catalog: Catalog,
}

impl Storefront {
    /// Open a storefront backed by files under `config.data_dir` and the
    /// HTTP API at `config.api_base_url`
    pub fn open(config: StorefrontConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.data_dir)?);
        let api: Arc<dyn CartApi> = Arc::new(HttpCartApi::new(&config)?);
        Ok(Self::with_parts(storage, api, config))
    }

    /// Assemble from explicit storage and API implementations
    pub fn with_parts(
        storage: Arc<dyn KeyValueStore>,
        api: Arc<dyn CartApi>,
        config: StorefrontConfig,
    ) -> Self {
        let keys = config.storage_keys();
        let store = Arc::new(CartStore::open(Arc::clone(&storage), &keys));
        let session = SessionIdentity::new(storage, keys);
        let reconciler = Reconciler::new(api, config.request_timeout);

        Self {
            config,
            store,
            session,
            reconciler,
            catalog: Catalog::builtin(),
        }
    }

    /// Replace the built-in catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    pub fn session(&self) -> &SessionIdentity {
        &self.session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn sync_phase(&self) -> SyncPhase {
        self.reconciler.phase()
    }

    /// Priced view of the current cart
    pub fn summary(&self) -> CartSummary {
        CartSummary::build(&self.store.snapshot(), &self.catalog)
    }

    /// Converge the remote cart to the local one without checking out
    pub async fn sync(&self) -> Result<ReconcileReport> {
        let identity = self.session.request_identity();
        self.reconciler
            .reconcile(&self.store.snapshot(), &identity)
            .await
    }

    /// Reconcile, then either start payment or ask for a billing address
    ///
    /// An empty cart is refused before any network call.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome> {
        let cart = self.store.snapshot();
        if !cart.has_items() {
            return Err(StorefrontError::EmptyCart);
        }

        let identity = self.session.request_identity();
        let address_id = request.address_id.as_deref();

        if self.config.require_address && identity.is_authenticated() && address_id.is_none() {
            self.reconciler.reconcile(&cart, &identity).await?;
            info!("Cart session {} needs a billing address", identity.session_id());
            return Ok(CheckoutOutcome::AddressRequired);
        }

        let url = self
            .reconciler
            .reconcile_and_checkout(&cart, &identity, address_id)
            .await?;
        Ok(CheckoutOutcome::Redirect { url })
    }

    /// Payment finished: drop the cart and the session so the next purchase
    /// starts with a fresh server-side cart
    pub fn complete_checkout(&self) -> Result<()> {
        self.store.clear();
        self.session.clear_session_id()?;
        info!("Checkout completed, cart and session cleared");
        Ok(())
    }

    /// Local address check; never reaches the network
    pub fn validate_address(&self, form: &AddressForm) -> Result<ValidAddress> {
        Ok(form.validate()?)
    }
}
