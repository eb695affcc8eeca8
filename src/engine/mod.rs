//! Reconciliation engine: the decision logic applied to identity-match
//! evidence and manual edits
//!
//! Every function here is pure with respect to its inputs. Callers take a
//! fresh snapshot of the existing records synchronously before each call and
//! apply the returned mutations themselves, which keeps the decisions
//! independently testable and never stale across an await.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use uuid::Uuid;

use crate::domain::{AttendanceRecord, AttendanceStatus, DayStatus, Identity};
use crate::oracle::RecognitionResult;

/// Hard business threshold: a match must score strictly above this to count
pub const CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Default cut-off after which a check-in is classified Late
pub fn default_late_threshold() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).expect("valid time of day")
}

/// Synthetic time-of-day stamped onto manually attested entries
pub fn manual_entry_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("valid time of day")
}

/// Result of reconciling one recognition result against the ledger
#[derive(Debug, Clone, Default)]
pub struct ReconciliationOutcome {
    /// Newly constructed records; the caller prepends them to the log to
    /// preserve reverse-chronological order
    pub new_records: Vec<AttendanceRecord>,

    /// Matches that were suppressed because an entry already exists today
    pub already_present: usize,

    /// Whether the raw result carried any sub-threshold match, kept distinct
    /// from "no match at all" for user messaging
    pub low_confidence_rejected: bool,
}

/// A single ledger mutation decided by a manual override
#[derive(Debug, Clone)]
pub enum LedgerMutation {
    /// Insert a new record
    Insert(AttendanceRecord),

    /// Update only the status field of an existing record
    SetStatus {
        record_id: Uuid,
        status: AttendanceStatus,
    },

    /// Remove the record for an identity on a date
    Remove { user_id: Uuid, date: NaiveDate },
}

/// An existing identity a registration probe collided with
#[derive(Debug, Clone)]
pub struct DuplicateFace {
    pub user_id: Uuid,
    pub name: String,
    pub confidence: f64,
}

/// Decide what the ledger should do with a recognition result.
///
/// Candidates at or below the confidence threshold are discarded; survivors
/// are resolved against the roster (unknown identifiers drop silently) and
/// checked against the one-entry-per-identity-per-day invariant on `now`'s
/// local date. Survivors without an entry become new records, classified
/// Late only when `now` is strictly after today's late-threshold instant.
pub fn submit_recognition(
    result: &RecognitionResult,
    roster: &[Identity],
    existing: &[AttendanceRecord],
    now: DateTime<Local>,
    late_threshold: NaiveTime,
) -> ReconciliationOutcome {
    let today = now.date_naive();
    let threshold_instant = today.and_time(late_threshold);
    let status = if now.naive_local() > threshold_instant {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };

    let mut outcome = ReconciliationOutcome {
        low_confidence_rejected: result
            .matches
            .iter()
            .any(|m| m.confidence <= CONFIDENCE_THRESHOLD),
        ..Default::default()
    };

    for candidate in &result.matches {
        if candidate.confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }
        let Some(identity) = roster.iter().find(|i| i.id == candidate.user_id) else {
            // The oracle should only return known identifiers.
            continue;
        };
        if has_entry_on(existing, identity.id, today)
            || outcome.new_records.iter().any(|r| r.user_id == identity.id)
        {
            outcome.already_present += 1;
            continue;
        }
        outcome.new_records.push(AttendanceRecord {
            id: Uuid::new_v4(),
            user_id: identity.id,
            user_name: identity.name.clone(),
            role: identity.role.clone(),
            timestamp: now,
            status,
            confidence: candidate.confidence,
        });
    }
    outcome
}

/// Decide the mutation for a manual status override.
///
/// `Absent` removes any record for the identity on that date; Present/Late
/// updates an existing record's status in place, or inserts a new record at
/// the default manual time with confidence 1.0 when none exists. Unknown
/// identities are a silent no-op.
pub fn update_status(
    user_id: Uuid,
    new_status: DayStatus,
    date: NaiveDate,
    roster: &[Identity],
    existing: &[AttendanceRecord],
) -> Option<LedgerMutation> {
    let status = match new_status {
        DayStatus::Absent => {
            if !has_entry_on(existing, user_id, date) {
                return None;
            }
            return Some(LedgerMutation::Remove { user_id, date });
        }
        DayStatus::Present => AttendanceStatus::Present,
        DayStatus::Late => AttendanceStatus::Late,
    };

    let identity = roster.iter().find(|i| i.id == user_id)?;

    if let Some(record) = existing
        .iter()
        .find(|r| r.user_id == user_id && r.is_on(date))
    {
        return Some(LedgerMutation::SetStatus {
            record_id: record.id,
            status,
        });
    }

    let naive = date.and_time(manual_entry_time());
    let timestamp = Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(Local::now);
    Some(LedgerMutation::Insert(AttendanceRecord {
        id: Uuid::new_v4(),
        user_id: identity.id,
        user_name: identity.name.clone(),
        role: identity.role.clone(),
        timestamp,
        status,
        // 1.0 signals "manually attested, not biometric".
        confidence: 1.0,
    }))
}

/// Registration pre-check: does this probe already match a roster identity?
///
/// Only matches strictly above the confidence threshold block registration.
pub fn check_duplicate_face(
    result: &RecognitionResult,
    roster: &[Identity],
) -> Option<DuplicateFace> {
    result
        .matches
        .iter()
        .filter(|m| m.confidence > CONFIDENCE_THRESHOLD)
        .find_map(|m| {
            roster.iter().find(|i| i.id == m.user_id).map(|identity| DuplicateFace {
                user_id: identity.id,
                name: identity.name.clone(),
                confidence: m.confidence,
            })
        })
}

fn has_entry_on(existing: &[AttendanceRecord], user_id: Uuid, date: NaiveDate) -> bool {
    existing.iter().any(|r| r.user_id == user_id && r.is_on(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CandidateMatch;
    use pretty_assertions::assert_eq;

    fn roster_of(names: &[&str]) -> Vec<Identity> {
        names
            .iter()
            .map(|n| Identity::new(*n, "Student", "Physics", "img"))
            .collect()
    }

    fn result_with(matches: Vec<(Uuid, f64)>) -> RecognitionResult {
        RecognitionResult {
            matches: matches
                .into_iter()
                .map(|(user_id, confidence)| CandidateMatch {
                    user_id,
                    confidence,
                })
                .collect(),
            reasoning: None,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 2, h, m, s)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn match_at_threshold_is_rejected_just_above_is_accepted() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;

        let rejected = submit_recognition(
            &result_with(vec![(id, 0.85)]),
            &roster,
            &[],
            at(9, 0, 0),
            default_late_threshold(),
        );
        assert!(rejected.new_records.is_empty());
        assert!(rejected.low_confidence_rejected);

        let accepted = submit_recognition(
            &result_with(vec![(id, 0.8501)]),
            &roster,
            &[],
            at(9, 0, 0),
            default_late_threshold(),
        );
        assert_eq!(accepted.new_records.len(), 1);
        assert!(!accepted.low_confidence_rejected);
        assert_eq!(accepted.new_records[0].confidence, 0.8501);
    }

    #[test]
    fn late_only_when_strictly_after_threshold() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;
        let threshold = default_late_threshold();

        let on_the_dot = submit_recognition(
            &result_with(vec![(id, 0.91)]),
            &roster,
            &[],
            at(9, 30, 0),
            threshold,
        );
        assert_eq!(on_the_dot.new_records[0].status, AttendanceStatus::Present);

        let one_second_late = submit_recognition(
            &result_with(vec![(id, 0.91)]),
            &roster,
            &[],
            at(9, 30, 1),
            threshold,
        );
        assert_eq!(one_second_late.new_records[0].status, AttendanceStatus::Late);
    }

    #[test]
    fn second_submission_same_day_is_suppressed() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;
        let result = result_with(vec![(id, 0.91)]);

        let first = submit_recognition(&result, &roster, &[], at(9, 0, 0), default_late_threshold());
        assert_eq!(first.new_records.len(), 1);
        assert_eq!(first.already_present, 0);

        let second = submit_recognition(
            &result,
            &roster,
            &first.new_records,
            at(10, 0, 0),
            default_late_threshold(),
        );
        assert!(second.new_records.is_empty());
        assert_eq!(second.already_present, 1);
    }

    #[test]
    fn mixed_confidence_pair_yields_one_record_and_flags_rejection() {
        let roster = roster_of(&["U1", "U2"]);
        let result = result_with(vec![(roster[0].id, 0.91), (roster[1].id, 0.80)]);

        let outcome =
            submit_recognition(&result, &roster, &[], at(9, 0, 0), default_late_threshold());
        assert_eq!(outcome.new_records.len(), 1);
        assert_eq!(outcome.new_records[0].user_id, roster[0].id);
        assert!(outcome.low_confidence_rejected);
        assert_eq!(outcome.already_present, 0);
    }

    #[test]
    fn unknown_identifier_drops_silently() {
        let roster = roster_of(&["Ana"]);
        let result = result_with(vec![(Uuid::new_v4(), 0.95)]);

        let outcome =
            submit_recognition(&result, &roster, &[], at(9, 0, 0), default_late_threshold());
        assert!(outcome.new_records.is_empty());
        assert_eq!(outcome.already_present, 0);
        assert!(!outcome.low_confidence_rejected);
    }

    #[test]
    fn duplicate_candidate_in_one_result_yields_one_record() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;
        let result = result_with(vec![(id, 0.91), (id, 0.97)]);

        let outcome =
            submit_recognition(&result, &roster, &[], at(9, 0, 0), default_late_threshold());
        assert_eq!(outcome.new_records.len(), 1);
        assert_eq!(outcome.already_present, 1);
    }

    #[test]
    fn denormalized_fields_come_from_the_resolved_identity() {
        let roster = roster_of(&["Ana"]);
        let outcome = submit_recognition(
            &result_with(vec![(roster[0].id, 0.9)]),
            &roster,
            &[],
            at(9, 0, 0),
            default_late_threshold(),
        );
        let record = &outcome.new_records[0];
        assert_eq!(record.user_name, "Ana");
        assert_eq!(record.role, "Student");
    }

    #[test]
    fn absent_override_removes_and_remarking_recreates_manually() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");

        let existing = submit_recognition(
            &result_with(vec![(id, 0.91)]),
            &roster,
            &[],
            at(8, 45, 0),
            default_late_threshold(),
        )
        .new_records;

        let removal = update_status(id, DayStatus::Absent, date, &roster, &existing);
        assert!(matches!(removal, Some(LedgerMutation::Remove { .. })));

        // After the removal took effect, re-marking creates a manual entry.
        let insert = update_status(id, DayStatus::Present, date, &roster, &[]);
        match insert {
            Some(LedgerMutation::Insert(record)) => {
                assert_eq!(record.confidence, 1.0);
                assert_eq!(record.timestamp.time(), manual_entry_time());
                assert_eq!(record.timestamp.date_naive(), date);
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn absent_override_without_record_is_a_no_op() {
        let roster = roster_of(&["Ana"]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        assert!(update_status(roster[0].id, DayStatus::Absent, date, &roster, &[]).is_none());
    }

    #[test]
    fn override_on_existing_record_touches_only_the_status() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        let existing = submit_recognition(
            &result_with(vec![(id, 0.91)]),
            &roster,
            &[],
            at(8, 45, 0),
            default_late_threshold(),
        )
        .new_records;

        let mutation = update_status(id, DayStatus::Late, date, &roster, &existing);
        match mutation {
            Some(LedgerMutation::SetStatus { record_id, status }) => {
                assert_eq!(record_id, existing[0].id);
                assert_eq!(status, AttendanceStatus::Late);
            }
            other => panic!("expected status update, got {other:?}"),
        }
    }

    #[test]
    fn override_for_unknown_identity_is_a_no_op() {
        let roster = roster_of(&["Ana"]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        assert!(update_status(Uuid::new_v4(), DayStatus::Present, date, &roster, &[]).is_none());
    }

    #[test]
    fn duplicate_face_blocks_only_above_threshold() {
        let roster = roster_of(&["Ana"]);
        let id = roster[0].id;

        let below = check_duplicate_face(&result_with(vec![(id, 0.85)]), &roster);
        assert!(below.is_none());

        let above = check_duplicate_face(&result_with(vec![(id, 0.92)]), &roster);
        let hit = above.expect("should match");
        assert_eq!(hit.user_id, id);
        assert_eq!(hit.name, "Ana");
        assert_eq!(hit.confidence, 0.92);
    }
}
