// ============================================================================
// Cart Reconciliation
// ============================================================================
//
// Local-is-truth convergence: the local cart is authoritative and the remote
// cart is driven to match it with the fewest calls, computed from a single
// pre-fetched remote snapshot.
//
// - plan:   pure diff producing the ordered mutation list
// - engine: sequential executor with timeouts and sync phase tracking
//
// ============================================================================

pub mod engine;
pub mod plan;

pub use engine::{ReconcileReport, Reconciler, SyncPhase};
pub use plan::{CartMutation, ReconcilePlan};
