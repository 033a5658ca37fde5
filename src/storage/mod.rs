pub mod kv;

pub use kv::FileStorage;

use crate::error::Result;
use crate::state::State;
use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// One committed operation, written to the audit log after the state
/// mutation succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub at: TimestampMs,
    pub lead_id: String,
    pub action: String,
    /// Opaque JSON text; displayed, never interpreted
    pub details: String,
}

impl EventRecord {
    pub fn new(at: TimestampMs, lead_id: &str, action: &str, details: String) -> Self {
        EventRecord {
            at,
            lead_id: lead_id.to_string(),
            action: action.to_string(),
            details,
        }
    }
}

/// Storage abstraction for the append-only audit log and state snapshots.
///
/// Implementations must preserve:
/// - Append-only semantics for the audit log
/// - Atomic snapshot writes (crash-safe)
pub trait Storage {
    /// Append an event to the audit log (append-only, fsync before ack)
    fn append_event(&mut self, event: &EventRecord) -> Result<()>;

    /// Load the latest state snapshot with the last recorded event ID
    ///
    /// Returns `None` if no snapshot exists (fresh install).
    fn load_state(&self) -> Result<Option<(State, u64)>>;

    /// Persist state snapshot atomically (write to temp file, fsync, rename)
    ///
    /// `last_event_id` is the sequential ID of the last event recorded
    /// against this state.
    fn persist_state(&mut self, state: &State, last_event_id: u64) -> Result<()>;

    /// Load events from the log starting from `from_event_id` (inclusive)
    ///
    /// Event IDs are sequential (0, 1, 2, ...).
    fn load_events_from(&self, from_event_id: u64) -> Result<Vec<EventRecord>>;
}
