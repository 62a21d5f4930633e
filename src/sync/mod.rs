//! Location synchronization: store polling and snapshot publication.

mod engine;

pub use engine::{LocationSyncEngine, TickOutcome};
