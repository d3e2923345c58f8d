//! Save-cycle state: pending changes and split-document correlation.

mod correlation;
mod state;

pub use correlation::{CorrelationRecord, TransactionContext};
pub use state::PendingCounts;
pub(crate) use state::{PendingChanges, PendingRemoval};
