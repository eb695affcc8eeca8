//! Event bus for decoupled communication

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{AttendanceStatus, DayStatus};

/// Ledger-related events
#[derive(Debug, Clone)]
pub enum Event {
    /// A check-in was reconciled into a new record
    CheckInRecorded {
        record_id: Uuid,
        user_id: Uuid,
        user_name: String,
        status: AttendanceStatus,
    },

    /// A recognition matched identities that were already marked today
    AlreadyPresent { count: usize },

    /// A new identity joined the roster
    IdentityRegistered { id: Uuid, name: String },

    /// An identity was deleted from the roster
    IdentityDeleted { id: Uuid },

    /// A manual override changed an identity's status for a day
    StatusOverridden {
        user_id: Uuid,
        date: NaiveDate,
        status: DayStatus,
    },

    /// A whole collection was replaced by an import
    CollectionImported {
        collection: ImportKind,
        count: usize,
    },

    /// The ledger was written to storage
    SaveCompleted { at: DateTime<Utc> },

    /// A storage write failed; the ledger stays dirty and will retry
    SaveFailed { reason: String },
}

/// Which persisted collection an import replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Roster,
    AttendanceLog,
}

/// Event bus for broadcasting events
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: Event) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
