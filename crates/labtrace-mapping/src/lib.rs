pub mod approval;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod persist;
pub mod tiers;
pub mod types;

pub use approval::{approve_pending_analyte, discard_pending_analyte, resolve_match_review, skip_match_review};
pub use engine::map_result;
pub use error::{MappingError, Result};
pub use persist::{list_pending_analytes, list_pending_reviews, list_unmapped_for_report};
pub use types::{
    Analyte, AnalyteAlias, MappingOutcome, MatchCandidate, MatchReview, MatchReviewStatus,
    PendingAnalyte, PendingAnalyteStatus,
};
