use sqlx::PgPool;
use tracing::instrument;

use labtrace_core::types::UserId;

use crate::error::Result;
use crate::types::AdminAction;

/// Append an `AdminAction` audit row. Called after every mutating admin
/// operation succeeds — mirroring the reference architecture's
/// `record_token_usage` shape of persisting around the gated action rather
/// than leaving the audit trail to a side effect the caller might forget.
#[instrument(skip(pool, detail))]
pub async fn record(pool: &PgPool, actor_id: UserId, action: AdminAction, detail: serde_json::Value) -> Result<()> {
    sqlx::query(
        "INSERT INTO admin_actions (id, actor_user_id, action, detail, created_at)
         VALUES ($1, $2, $3, $4, now())",
    )
    .bind(uuid::Uuid::now_v7())
    .bind(actor_id.as_uuid())
    .bind(action.code())
    .bind(detail)
    .execute(pool)
    .await?;
    Ok(())
}
