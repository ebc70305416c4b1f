//! Checkout hand-off
//!
//! Checkout itself is delegated to the remote API; locally we only validate
//! billing addresses and describe where the flow goes next.

pub mod address;

pub use address::{AddressForm, ValidAddress};

/// Input to `Storefront::checkout`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Saved billing address chosen by an authenticated user
    pub address_id: Option<String>,
}

impl CheckoutRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(address_id: impl Into<String>) -> Self {
        Self {
            address_id: Some(address_id.into()),
        }
    }
}

/// Where the checkout flow continues after the remote cart converged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Payment session created; send the user to `url`
    Redirect { url: String },

    /// A billing address must be picked before payment can start
    AddressRequired,
}

impl CheckoutOutcome {
    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            CheckoutOutcome::Redirect { url } => Some(url),
            CheckoutOutcome::AddressRequired => None,
        }
    }
}
