//! Crate-level error type aggregating the per-area failures

use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecError;
use crate::oracle::OracleError;
use crate::persistence::PersistenceError;

/// Failures of the high-level Core operations.
///
/// None of these are fatal: every failure leaves the in-memory ledger in
/// its last-known-good state.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed or unrecognized file structure; the import was rejected
    /// whole and nothing was applied
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The identity-match call failed; no ledger mutation occurred
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// A storage read or write failed; the ledger stays authoritative and
    /// dirty state is retried
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A check-in was requested but no oracle has been configured
    #[error("no recognition oracle configured")]
    NoOracle,

    /// Registration blocked: the probe already matches a registered face
    #[error("registration blocked: face already matches {name} ({confidence:.2} confidence)")]
    DuplicateFace {
        user_id: Uuid,
        name: String,
        confidence: f64,
    },
}
