use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labtrace_core::types::{AnalyteId, LabResultId, MappingSource, MatchReviewId, PendingAnalyteId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Analyte {
    pub id: AnalyteId,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyteAlias {
    pub analyte_id: AnalyteId,
    pub normalized_alias: String,
    pub display_form: String,
    pub language: Option<String>,
    pub confidence: f64,
    pub source: MappingSource,
}

/// Lifecycle: `pending -> approved | discarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAnalyteStatus {
    Pending,
    Approved,
    Discarded,
}

impl std::fmt::Display for PendingAnalyteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PendingAnalyteStatus::Pending => "pending",
            PendingAnalyteStatus::Approved => "approved",
            PendingAnalyteStatus::Discarded => "discarded",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PendingAnalyteStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "discarded" => Ok(Self::Discarded),
            other => Err(format!("unknown pending analyte status: {other}")),
        }
    }
}

/// A proposal for a new canonical analyte, carrying the evidence (raw
/// parameter spellings) that prompted the LLM tier to suggest it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAnalyte {
    pub id: PendingAnalyteId,
    pub proposed_code: String,
    pub proposed_name: String,
    pub evidence: Vec<EvidenceRow>,
    pub status: PendingAnalyteStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRow {
    pub lab_result_id: LabResultId,
    pub parameter_variation: String,
    pub language: Option<String>,
}

/// Lifecycle: `pending -> resolved | skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReviewStatus {
    Pending,
    Resolved,
    Skipped,
}

impl std::fmt::Display for MatchReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchReviewStatus::Pending => "pending",
            MatchReviewStatus::Resolved => "resolved",
            MatchReviewStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MatchReviewStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown match review status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub analyte_id: Option<AnalyteId>,
    pub proposed_code: Option<String>,
    pub label: String,
    pub score: f64,
}

/// An ambiguous raw parameter awaiting human choice, ordered candidates by
/// descending similarity per §8 testable property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReview {
    pub id: MatchReviewId,
    pub lab_result_id: LabResultId,
    pub candidates: Vec<MatchCandidate>,
    pub status: MatchReviewStatus,
}

/// What the mapping engine decided for one `LabResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MappingOutcome {
    Bound { analyte_id: AnalyteId, confidence: f64, source: MappingSource },
    QueuedForReview { candidate_count: usize },
    QueuedProposal { proposed_code: String },
    Unmapped,
}
