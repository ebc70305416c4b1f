pub mod error;
pub mod types;

pub use error::{Result, StorefrontError, ValidationError};
pub use types::{BillingCycle, CartItem, CartState, ItemKind};
