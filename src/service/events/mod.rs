pub mod reconcile;
pub mod timing;

pub use reconcile::{eps_surprise_pct, reconcile, Diagnostic, DropReason, Reconciliation};
pub use timing::{classify, classify_instant, SessionTiming};
