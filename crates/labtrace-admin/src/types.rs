use labtrace_core::types::UserRole;

/// All admin-gated capabilities in one place, mirroring the reference
/// architecture's `Permission` enum shape — adding a variant here forces
/// `check()` to account for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    ListPendingAnalytes,
    ListPendingReviews,
    ApprovePendingAnalyte,
    DiscardPendingAnalyte,
    ResolveMatchReview,
    SkipMatchReview,
    ResetStore,
    ReadAnyUserData,
}

impl AdminAction {
    pub fn code(&self) -> &'static str {
        match self {
            AdminAction::ListPendingAnalytes => "list_pending_analytes",
            AdminAction::ListPendingReviews => "list_pending_reviews",
            AdminAction::ApprovePendingAnalyte => "approve_pending_analyte",
            AdminAction::DiscardPendingAnalyte => "discard_pending_analyte",
            AdminAction::ResolveMatchReview => "resolve_match_review",
            AdminAction::SkipMatchReview => "skip_match_review",
            AdminAction::ResetStore => "reset_store",
            AdminAction::ReadAnyUserData => "read_any_user_data",
        }
    }
}

/// Result of a permission check, consulted before every mutating admin
/// call.
#[derive(Debug, Clone)]
pub enum PermissionCheck {
    Allowed,
    Denied { reason: String },
}

/// The authenticated identity behind an admin call. Every `AdminAction`
/// currently requires `UserRole::Admin`; this struct still carries a role
/// field (rather than a bare bool) so a future lower-privilege capability
/// has somewhere to key off.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller {
    pub id: labtrace_core::types::UserId,
    pub role: UserRole,
}
