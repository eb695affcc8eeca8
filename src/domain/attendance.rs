//! Attendance records and day-level projections
//!
//! A record ties an identity to one check-in instant. Absence is never
//! stored: it is derived at read time by projecting the roster against the
//! records of a given local calendar day.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::Identity;

/// Persisted status of a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum AttendanceStatus {
    Present,
    Late,
}

/// Status of an identity on a given day, including the derived variant
///
/// `Absent` exists only in projections and manual overrides; it is never
/// written as a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum DayStatus {
    Present,
    Late,
    Absent,
}

impl From<AttendanceStatus> for DayStatus {
    fn from(status: AttendanceStatus) -> Self {
        match status {
            AttendanceStatus::Present => DayStatus::Present,
            AttendanceStatus::Late => DayStatus::Late,
        }
    }
}

/// One check-in record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// Unique identifier of the record itself
    pub id: Uuid,

    /// Identifier of the checked-in identity
    pub user_id: Uuid,

    /// Name captured at write time, not re-joined against the roster
    pub user_name: String,

    /// Role captured at write time
    pub role: String,

    /// Instant of check-in
    pub timestamp: DateTime<Local>,

    /// Present or Late
    pub status: AttendanceStatus,

    /// Confidence in [0.0, 1.0]; 1.0 is reserved for manual entries
    pub confidence: f64,
}

impl AttendanceRecord {
    /// Local calendar date of the check-in
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Whether this record falls on the given local date
    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.local_date() == date
    }
}

/// One row of a day view
#[derive(Debug, Clone)]
pub struct DayRow {
    pub user_id: Uuid,
    pub name: String,
    pub role: String,
    pub status: DayStatus,
    /// The backing record for Present/Late rows; None for Absent rows
    pub record: Option<AttendanceRecord>,
    /// True when the record's identity no longer exists in the roster
    pub orphaned: bool,
}

/// Aggregate counts for one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStats {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
}

/// Read-time projection of one local calendar day
#[derive(Debug, Clone)]
pub struct DayView {
    pub date: NaiveDate,
    pub rows: Vec<DayRow>,
}

impl DayView {
    /// Project the roster against the records of `date`.
    ///
    /// Every roster identity yields exactly one row; identities without a
    /// record that day come out Absent. Records whose identity was deleted
    /// are appended after the roster rows, rendered from their denormalized
    /// name and role.
    pub fn project(roster: &[Identity], log: &[AttendanceRecord], date: NaiveDate) -> Self {
        let day_records: Vec<&AttendanceRecord> = log.iter().filter(|r| r.is_on(date)).collect();

        let mut rows: Vec<DayRow> = roster
            .iter()
            .map(|identity| {
                let record = day_records.iter().find(|r| r.user_id == identity.id);
                DayRow {
                    user_id: identity.id,
                    name: identity.name.clone(),
                    role: identity.role.clone(),
                    status: record.map_or(DayStatus::Absent, |r| r.status.into()),
                    record: record.map(|r| (*r).clone()),
                    orphaned: false,
                }
            })
            .collect();

        // Orphaned records stay visible through their denormalized copies.
        for record in day_records {
            if !roster.iter().any(|i| i.id == record.user_id) {
                rows.push(DayRow {
                    user_id: record.user_id,
                    name: record.user_name.clone(),
                    role: record.role.clone(),
                    status: record.status.into(),
                    record: Some(record.clone()),
                    orphaned: true,
                });
            }
        }

        Self { date, rows }
    }

    /// Aggregate counts over the projected rows
    pub fn stats(&self) -> DayStats {
        let mut stats = DayStats {
            total: self.rows.len(),
            ..Default::default()
        };
        for row in &self.rows {
            match row.status {
                DayStatus::Present => stats.present += 1,
                DayStatus::Late => stats.late += 1,
                DayStatus::Absent => stats.absent += 1,
            }
        }
        stats
    }
}
