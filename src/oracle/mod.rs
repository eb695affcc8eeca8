//! Identity-match oracle seam
//!
//! The remote face-matching service is a black box: given a probe image and
//! the roster of reference images it returns candidate identity matches with
//! confidence scores. The engine re-validates confidence independently and
//! never trusts the oracle's list to already be filtered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Identity;

/// One candidate identity match reported by the oracle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// Identifier of the matched roster identity
    pub user_id: Uuid,

    /// Confidence score in [0.0, 1.0]
    pub confidence: f64,
}

/// Full oracle response for one probe image
///
/// Multiple matches mean multiple people were recognized in one probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub matches: Vec<CandidateMatch>,

    /// Optional free-text rationale, for display only
    pub reasoning: Option<String>,
}

/// Oracle failures; recoverable, never mutate the ledger
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("recognition service unavailable: {0}")]
    Unavailable(String),

    #[error("recognition service returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// External identity-matching service, consumed as an opaque scoring function
#[async_trait]
pub trait RecognitionOracle: Send + Sync {
    /// Match one probe image against the roster's reference images
    async fn recognize(
        &self,
        probe: &[u8],
        roster: &[Identity],
    ) -> Result<RecognitionResult, OracleError>;
}

/// Scripted oracle returning a fixed response, for tests and offline runs
#[derive(Debug, Clone)]
pub struct FixedOracle {
    result: RecognitionResult,
}

impl FixedOracle {
    pub fn new(result: RecognitionResult) -> Self {
        Self { result }
    }

    /// Oracle that reports the given matches for every probe
    pub fn with_matches(matches: Vec<CandidateMatch>) -> Self {
        Self::new(RecognitionResult {
            matches,
            reasoning: None,
        })
    }
}

#[async_trait]
impl RecognitionOracle for FixedOracle {
    async fn recognize(
        &self,
        _probe: &[u8],
        _roster: &[Identity],
    ) -> Result<RecognitionResult, OracleError> {
        Ok(self.result.clone())
    }
}
