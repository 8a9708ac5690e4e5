//! Patient-existence and count queries the orchestrator re-runs on every
//! message (§4.10 step 1 — "never cached on the session").

use sqlx::PgPool;

use labtrace_core::types::{PatientId, UserId};

pub async fn owned_patient_count(pool: &PgPool, owner_user_id: UserId) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM patients WHERE owner_user_id = $1")
        .bind(owner_user_id.as_uuid())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn patient_exists(pool: &PgPool, owner_user_id: UserId, patient_id: PatientId) -> Result<bool, sqlx::Error> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM patients WHERE id = $1 AND owner_user_id = $2")
            .bind(patient_id.as_uuid())
            .bind(owner_user_id.as_uuid())
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}
