use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use crate::audit;
use crate::error::Result;
use crate::permission::require_allowed;
use crate::types::{AdminAction, AdminCaller};

/// Tables truncated by a store reset, in `TRUNCATE ... CASCADE` dependency
/// order. `admin_actions` itself is left alone so the reset is visible in
/// its own audit trail.
const RESET_TABLES: &[&str] = &[
    "pending_analyte_evidence",
    "pending_analytes",
    "match_reviews",
    "analyte_aliases",
    "analytes",
    "lab_results",
    "reports",
    "patients",
];

/// Wipe every domain table declared in `RESET_TABLES`. Sessions and jobs
/// are in-memory (`labtrace-sessions`, `labtrace-jobs`) and are unaffected —
/// a caller that wants a fully clean slate restarts the process.
#[instrument(skip(pool))]
pub async fn reset_store(pool: &PgPool, caller: &AdminCaller) -> Result<()> {
    require_allowed(caller, AdminAction::ResetStore)?;

    let mut tx = pool.begin().await?;
    for table in RESET_TABLES {
        sqlx::query(&format!("TRUNCATE TABLE {table} CASCADE")).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    audit::record(pool, caller.id, AdminAction::ResetStore, json!({ "tables": RESET_TABLES })).await?;
    Ok(())
}
