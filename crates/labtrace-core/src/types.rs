use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Mint a new time-sortable identifier (UUIDv7).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(UserId, "Identity principal — owns patients, reports, sessions, jobs.");
uuid_id!(PatientId, "A subject of reports, scoped to one owning user.");
uuid_id!(ReportId, "One ingested lab artifact.");
uuid_id!(LabResultId, "One extracted parameter row of a report.");
uuid_id!(AnalyteId, "Canonical vocabulary entry.");
uuid_id!(PendingAnalyteId, "A proposal awaiting admin approval.");
uuid_id!(MatchReviewId, "An ambiguous raw parameter awaiting human choice.");
uuid_id!(SessionId, "Conversational session key.");
uuid_id!(JobId, "Long-running background task descriptor.");

/// Per-connection identifier for an SSE attachment. Not persisted — random
/// per `attach()` call, purely for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Report lifecycle. Flows `Pending -> Processing -> {Completed | Failed}`
/// and never regresses — see the terminal-state guard in `labtrace-jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReportStatus {
    /// Once `Completed` or `Failed`, no further transition is admitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Failed)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Processing => "processing",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

/// Where a result's value sits relative to its reference interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    Above,
    Below,
    Within,
    FlaggedByLab,
    #[default]
    Unknown,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutOfRange::Above => "above",
            OutOfRange::Below => "below",
            OutOfRange::Within => "within",
            OutOfRange::FlaggedByLab => "flagged_by_lab",
            OutOfRange::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OutOfRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            "within" => Ok(Self::Within),
            "flagged_by_lab" => Ok(Self::FlaggedByLab),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown out_of_range value: {other}")),
        }
    }
}

/// How a `LabResult` came to be bound to its `Analyte`, recorded for audit
/// and for the admin review UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    AliasExact,
    FuzzyAuto,
    LlmAuto,
    ManualResolved,
    PendingApproved,
    ManualApproved,
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MappingSource::AliasExact => "alias_exact",
            MappingSource::FuzzyAuto => "fuzzy_auto",
            MappingSource::LlmAuto => "llm_auto",
            MappingSource::ManualResolved => "manual_resolved",
            MappingSource::PendingApproved => "pending_approved",
            MappingSource::ManualApproved => "manual_approved",
        };
        write!(f, "{s}")
    }
}

/// User role — admin callers may pass `admin_mode` explicitly to bypass
/// row-level scoping; every other caller is always scoped to its own rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_status_terminal() {
        assert!(!ReportStatus::Pending.is_terminal());
        assert!(!ReportStatus::Processing.is_terminal());
        assert!(ReportStatus::Completed.is_terminal());
        assert!(ReportStatus::Failed.is_terminal());
    }

    #[test]
    fn ids_roundtrip_display_and_parse() {
        let id = ReportId::new();
        let s = id.to_string();
        let parsed: ReportId = s.parse().expect("parse failed");
        assert_eq!(id, parsed);
    }
}
