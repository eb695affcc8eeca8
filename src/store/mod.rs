//! In-memory authoritative ledger: roster, attendance log, dirty flag
//!
//! The store is mutated only through engine outcomes, manual-override
//! mutations, registration/deletion, and whole-collection imports. Every
//! mutation marks it dirty; the persistence side clears the flag after a
//! successful write.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{AttendanceRecord, DayStats, DayView, Identity};
use crate::engine::{LedgerMutation, ReconciliationOutcome};

/// The authoritative in-memory collections plus persistence bookkeeping
#[derive(Debug, Default)]
pub struct LedgerStore {
    roster: Vec<Identity>,
    /// Attendance log, newest first
    log: Vec<AttendanceRecord>,
    dirty: bool,
    /// Monotonic mutation counter; a save snapshot carries it so a write
    /// that raced a newer mutation cannot clear the dirty flag
    generation: u64,
    last_saved: Option<DateTime<Utc>>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roster(&self) -> &[Identity] {
        &self.roster
    }

    pub fn log(&self) -> &[AttendanceRecord] {
        &self.log
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current mutation generation; bumped by every ledger mutation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn find_identity(&self, id: Uuid) -> Option<&Identity> {
        self.roster.iter().find(|i| i.id == id)
    }

    /// Add a newly registered identity
    pub fn register(&mut self, identity: Identity) {
        debug!(id = %identity.id, name = %identity.name, "registering identity");
        self.roster.push(identity);
        self.touch();
    }

    /// Delete an identity; its historical records remain, orphaned.
    /// Returns false when the id is unknown.
    pub fn delete_identity(&mut self, id: Uuid) -> bool {
        let before = self.roster.len();
        self.roster.retain(|i| i.id != id);
        if self.roster.len() == before {
            return false;
        }
        self.touch();
        true
    }

    /// Apply a reconciliation outcome by prepending its new records,
    /// preserving reverse-chronological order
    pub fn apply_outcome(&mut self, outcome: ReconciliationOutcome) -> Vec<AttendanceRecord> {
        if outcome.new_records.is_empty() {
            return Vec::new();
        }
        self.log.splice(0..0, outcome.new_records.iter().cloned());
        self.touch();
        outcome.new_records
    }

    /// Apply a manual-override mutation
    pub fn apply_mutation(&mut self, mutation: LedgerMutation) {
        match mutation {
            LedgerMutation::Insert(record) => {
                self.log.insert(0, record);
            }
            LedgerMutation::SetStatus { record_id, status } => {
                if let Some(record) = self.log.iter_mut().find(|r| r.id == record_id) {
                    record.status = status;
                }
            }
            LedgerMutation::Remove { user_id, date } => {
                self.log.retain(|r| !(r.user_id == user_id && r.is_on(date)));
            }
        }
        self.touch();
    }

    /// Replace the whole roster (import surface); never a merge
    pub fn replace_roster(&mut self, roster: Vec<Identity>) -> usize {
        let count = roster.len();
        self.roster = roster;
        self.touch();
        count
    }

    /// Replace the whole attendance log (import surface); never a merge
    pub fn replace_log(&mut self, log: Vec<AttendanceRecord>) -> usize {
        let count = log.len();
        self.log = log;
        self.touch();
        count
    }

    /// Install freshly loaded collections without dirtying the store;
    /// what was just read from storage is by definition saved state
    pub fn install_loaded(
        &mut self,
        roster: Option<Vec<Identity>>,
        log: Option<Vec<AttendanceRecord>>,
    ) {
        if let Some(roster) = roster {
            self.roster = roster;
        }
        if let Some(log) = log {
            self.log = log;
        }
        self.dirty = false;
        self.last_saved = Some(Utc::now());
    }

    /// Record a successful persistence write of the given generation.
    ///
    /// The dirty flag clears only when the generation still matches: a
    /// mutation that landed while the write was in flight is not in the
    /// written bytes, so the store must stay dirty and the next save
    /// retries with current state.
    pub fn mark_saved(&mut self, at: DateTime<Utc>, generation: u64) {
        if self.generation == generation {
            self.dirty = false;
        }
        self.last_saved = Some(at);
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Project one local calendar day
    pub fn day_view(&self, date: NaiveDate) -> DayView {
        DayView::project(&self.roster, &self.log, date)
    }

    /// Aggregate counts for one local calendar day
    pub fn day_stats(&self, date: NaiveDate) -> DayStats {
        self.day_view(date).stats()
    }
}
