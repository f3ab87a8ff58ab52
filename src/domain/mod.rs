pub mod entry;
pub mod snapshot;
pub mod transition;

pub use entry::{Entry, EntryPeriod};
pub use snapshot::{FeedRecord, PreviousCycleState, Snapshot};
pub use transition::{CloseReason, Transition, TransitionKind};
