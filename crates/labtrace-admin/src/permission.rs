use labtrace_core::types::UserRole;

use crate::error::{AdminError, Result};
use crate::types::{AdminAction, AdminCaller, PermissionCheck};

/// Evaluate whether `caller` may perform `action`.
///
/// Every action here requires `UserRole::Admin` — there is no partial admin
/// tier in this system, unlike the reference architecture's per-user
/// capability flags. The match is still exhaustive over `AdminAction` so a
/// future variant with different requirements can't be added silently.
pub fn check(caller: &AdminCaller, action: &AdminAction) -> PermissionCheck {
    if caller.role == UserRole::Admin {
        return PermissionCheck::Allowed;
    }

    match action {
        AdminAction::ListPendingAnalytes
        | AdminAction::ListPendingReviews
        | AdminAction::ApprovePendingAnalyte
        | AdminAction::DiscardPendingAnalyte
        | AdminAction::ResolveMatchReview
        | AdminAction::SkipMatchReview
        | AdminAction::ResetStore
        | AdminAction::ReadAnyUserData => PermissionCheck::Denied { reason: "admin role required".to_string() },
    }
}

/// `check()` collapsed into a `Result`, for callers that just want to bail
/// with an error rather than pattern-match the check outcome.
pub fn require_allowed(caller: &AdminCaller, action: AdminAction) -> Result<()> {
    match check(caller, &action) {
        PermissionCheck::Allowed => Ok(()),
        PermissionCheck::Denied { reason } => Err(AdminError::Denied(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_core::types::UserId;

    fn caller(role: UserRole) -> AdminCaller {
        AdminCaller { id: UserId::new(), role }
    }

    #[test]
    fn admin_allowed_everything() {
        let c = caller(UserRole::Admin);
        assert!(matches!(check(&c, &AdminAction::ResetStore), PermissionCheck::Allowed));
        assert!(matches!(check(&c, &AdminAction::ReadAnyUserData), PermissionCheck::Allowed));
    }

    #[test]
    fn non_admin_denied() {
        let c = caller(UserRole::User);
        assert!(matches!(check(&c, &AdminAction::ApprovePendingAnalyte), PermissionCheck::Denied { .. }));
    }
}
