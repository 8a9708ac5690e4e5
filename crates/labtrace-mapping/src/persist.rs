use sqlx::{PgPool, Postgres, Transaction};

use labtrace_core::types::{AnalyteId, LabResultId, MappingSource, MatchReviewId, PendingAnalyteId, ReportId};

use crate::error::Result;
use crate::types::{EvidenceRow, MatchCandidate, MatchReview, MatchReviewStatus, PendingAnalyte, PendingAnalyteStatus};

pub async fn bind_result(
    pool: &PgPool,
    lab_result_id: LabResultId,
    analyte_id: AnalyteId,
    confidence: f64,
    source: MappingSource,
) -> Result<()> {
    sqlx::query(
        "UPDATE lab_results
         SET analyte_id = $1, mapping_confidence = $2, mapping_source = $3, mapped_at = now()
         WHERE id = $4",
    )
    .bind(analyte_id.as_uuid())
    .bind(confidence)
    .bind(source.to_string())
    .bind(lab_result_id.as_uuid())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn bind_result_tx(
    tx: &mut Transaction<'_, Postgres>,
    lab_result_id: LabResultId,
    analyte_id: AnalyteId,
    confidence: f64,
    source: MappingSource,
) -> Result<()> {
    sqlx::query(
        "UPDATE lab_results
         SET analyte_id = $1, mapping_confidence = $2, mapping_source = $3, mapped_at = now()
         WHERE id = $4",
    )
    .bind(analyte_id.as_uuid())
    .bind(confidence)
    .bind(source.to_string())
    .bind(lab_result_id.as_uuid())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn find_analyte_by_code(pool: &PgPool, code: &str) -> Result<Option<AnalyteId>> {
    let row: Option<(uuid::Uuid,)> = sqlx::query_as("SELECT id FROM analytes WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(id,)| AnalyteId::from(id)))
}

pub async fn create_match_review(
    pool: &PgPool,
    lab_result_id: LabResultId,
    candidates: &[MatchCandidate],
) -> Result<MatchReviewId> {
    let id = MatchReviewId::new();
    let candidates_json = serde_json::to_value(candidates).expect("candidates serialize");
    sqlx::query(
        "INSERT INTO match_reviews (id, lab_result_id, candidates, status, created_at)
         VALUES ($1, $2, $3, $4, now())",
    )
    .bind(id.as_uuid())
    .bind(lab_result_id.as_uuid())
    .bind(candidates_json)
    .bind(MatchReviewStatus::Pending.to_string())
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn fetch_match_review(pool: &PgPool, id: MatchReviewId) -> Result<Option<MatchReview>> {
    let row: Option<(uuid::Uuid, uuid::Uuid, serde_json::Value, String)> = sqlx::query_as(
        "SELECT id, lab_result_id, candidates, status FROM match_reviews WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await?;

    let Some((id, lab_result_id, candidates, status)) = row else {
        return Ok(None);
    };

    let candidates: Vec<MatchCandidate> = serde_json::from_value(candidates).unwrap_or_default();
    let status: MatchReviewStatus = status.parse().unwrap_or(MatchReviewStatus::Pending);

    Ok(Some(MatchReview {
        id: MatchReviewId::from(id),
        lab_result_id: LabResultId::from(lab_result_id),
        candidates,
        status,
    }))
}

pub async fn fetch_review_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: MatchReviewId,
) -> Result<Option<MatchReview>> {
    let row: Option<(uuid::Uuid, uuid::Uuid, serde_json::Value, String)> = sqlx::query_as(
        "SELECT id, lab_result_id, candidates, status FROM match_reviews WHERE id = $1 FOR UPDATE",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?;

    let Some((id, lab_result_id, candidates, status)) = row else {
        return Ok(None);
    };

    let candidates: Vec<MatchCandidate> = serde_json::from_value(candidates).unwrap_or_default();
    let status: MatchReviewStatus = status.parse().unwrap_or(MatchReviewStatus::Pending);

    Ok(Some(MatchReview {
        id: MatchReviewId::from(id),
        lab_result_id: LabResultId::from(lab_result_id),
        candidates,
        status,
    }))
}

pub async fn set_match_review_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: MatchReviewId,
    status: MatchReviewStatus,
) -> Result<()> {
    sqlx::query("UPDATE match_reviews SET status = $1 WHERE id = $2")
        .bind(status.to_string())
        .bind(id.as_uuid())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Every `MatchReview` still `pending` whose candidate list contains
/// `proposed_code` — resolved as part of approval backfill phase (ii).
pub async fn find_pending_reviews_for_proposed_code(
    pool: &PgPool,
    proposed_code: &str,
) -> Result<Vec<MatchReviewId>> {
    let rows: Vec<(uuid::Uuid, serde_json::Value)> =
        sqlx::query_as("SELECT id, candidates FROM match_reviews WHERE status = 'pending'")
            .fetch_all(pool)
            .await?;

    let mut matches = Vec::new();
    for (id, candidates) in rows {
        let candidates: Vec<MatchCandidate> = serde_json::from_value(candidates).unwrap_or_default();
        if candidates
            .iter()
            .any(|c| c.proposed_code.as_deref() == Some(proposed_code))
        {
            matches.push(MatchReviewId::from(id));
        }
    }
    Ok(matches)
}

pub async fn create_pending_analyte(
    pool: &PgPool,
    proposed_code: &str,
    proposed_name: &str,
    lab_result_id: LabResultId,
    parameter_variation: &str,
    language: Option<&str>,
) -> Result<PendingAnalyteId> {
    let existing: Option<(uuid::Uuid,)> =
        sqlx::query_as("SELECT id FROM pending_analytes WHERE proposed_code = $1 AND status = 'pending'")
            .bind(proposed_code)
            .fetch_optional(pool)
            .await?;

    let id = match existing {
        Some((id,)) => PendingAnalyteId::from(id),
        None => {
            let id = PendingAnalyteId::new();
            sqlx::query(
                "INSERT INTO pending_analytes (id, proposed_code, proposed_name, status, created_at)
                 VALUES ($1, $2, $3, 'pending', now())",
            )
            .bind(id.as_uuid())
            .bind(proposed_code)
            .bind(proposed_name)
            .execute(pool)
            .await?;
            id
        }
    };

    sqlx::query(
        "INSERT INTO pending_analyte_evidence (pending_analyte_id, lab_result_id, parameter_variation, language)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(id.as_uuid())
    .bind(lab_result_id.as_uuid())
    .bind(parameter_variation)
    .bind(language)
    .execute(pool)
    .await?;

    Ok(id)
}

pub struct PendingAnalyteRow {
    pub proposed_code: String,
    pub proposed_name: String,
    pub status: String,
}

pub async fn fetch_pending_analyte_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: PendingAnalyteId,
) -> Result<Option<PendingAnalyteRow>> {
    let row: Option<(String, String, String)> = sqlx::query_as(
        "SELECT proposed_code, proposed_name, status FROM pending_analytes WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(proposed_code, proposed_name, status)| PendingAnalyteRow {
        proposed_code,
        proposed_name,
        status,
    }))
}

pub async fn evidence_variations_tx(
    tx: &mut Transaction<'_, Postgres>,
    pending_analyte_id: PendingAnalyteId,
) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT parameter_variation FROM pending_analyte_evidence WHERE pending_analyte_id = $1",
    )
    .bind(pending_analyte_id.as_uuid())
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|(v,)| v).collect())
}

pub async fn create_analyte_tx(
    tx: &mut Transaction<'_, Postgres>,
    code: &str,
    name: &str,
) -> Result<AnalyteId> {
    let id = AnalyteId::new();
    sqlx::query("INSERT INTO analytes (id, code, name) VALUES ($1, $2, $3)")
        .bind(id.as_uuid())
        .bind(code)
        .bind(name)
        .execute(&mut **tx)
        .await?;
    Ok(id)
}

pub async fn insert_alias_tx(
    tx: &mut Transaction<'_, Postgres>,
    analyte_id: AnalyteId,
    normalized_alias: &str,
    display_form: &str,
    confidence: f64,
    source: MappingSource,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO analyte_aliases (analyte_id, normalized_alias, display_form, confidence, source, created_at)
         VALUES ($1, $2, $3, $4, $5, now())
         ON CONFLICT (analyte_id, normalized_alias) DO NOTHING",
    )
    .bind(analyte_id.as_uuid())
    .bind(normalized_alias)
    .bind(display_form)
    .bind(confidence)
    .bind(source.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn set_pending_analyte_status_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: PendingAnalyteId,
    status: &str,
) -> Result<()> {
    sqlx::query("UPDATE pending_analytes SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(id.as_uuid())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Every still-unmapped result whose raw parameter fuzzy-matches `variation`
/// above `threshold` — phase (i) of approval backfill.
pub async fn find_unmapped_fuzzy_matches_tx(
    tx: &mut Transaction<'_, Postgres>,
    variation: &str,
    threshold: f64,
) -> Result<Vec<LabResultId>> {
    let normalized = crate::normalize::normalize_alias(variation);
    let rows: Vec<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT id FROM lab_results
         WHERE analyte_id IS NULL
           AND similarity(lower(parameter_name_raw), $1) >= $2",
    )
    .bind(&normalized)
    .bind(threshold)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows.into_iter().map(|(id,)| LabResultId::from(id)).collect())
}

/// Every not-yet-mapped result of `report_id`, for the post-ingestion
/// mapping sweep (§4.7 step 6, "trigger mapping").
pub async fn list_unmapped_for_report(pool: &PgPool, report_id: ReportId) -> Result<Vec<(LabResultId, String)>> {
    let rows: Vec<(uuid::Uuid, String)> = sqlx::query_as(
        "SELECT id, parameter_name_raw FROM lab_results WHERE report_id = $1 AND analyte_id IS NULL",
    )
    .bind(report_id.as_uuid())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id, name)| (LabResultId::from(id), name)).collect())
}

/// Every `PendingAnalyte` still awaiting admin sign-off, with its evidence
/// rows joined in, newest first.
pub async fn list_pending_analytes(pool: &PgPool) -> Result<Vec<PendingAnalyte>> {
    let rows: Vec<(uuid::Uuid, String, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT id, proposed_code, proposed_name, created_at FROM pending_analytes
         WHERE status = 'pending' ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, proposed_code, proposed_name, created_at) in rows {
        let id = PendingAnalyteId::from(id);
        let evidence_rows: Vec<(uuid::Uuid, String, Option<String>)> = sqlx::query_as(
            "SELECT lab_result_id, parameter_variation, language
             FROM pending_analyte_evidence WHERE pending_analyte_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(pool)
        .await?;

        let evidence = evidence_rows
            .into_iter()
            .map(|(lab_result_id, parameter_variation, language)| EvidenceRow {
                lab_result_id: LabResultId::from(lab_result_id),
                parameter_variation,
                language,
            })
            .collect();

        out.push(PendingAnalyte {
            id,
            proposed_code,
            proposed_name,
            evidence,
            status: PendingAnalyteStatus::Pending,
            created_at,
        });
    }
    Ok(out)
}

/// Every `MatchReview` still awaiting a human choice.
pub async fn list_pending_reviews(pool: &PgPool) -> Result<Vec<MatchReview>> {
    let rows: Vec<(uuid::Uuid, uuid::Uuid, serde_json::Value)> = sqlx::query_as(
        "SELECT id, lab_result_id, candidates FROM match_reviews WHERE status = 'pending'",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, lab_result_id, candidates)| MatchReview {
            id: MatchReviewId::from(id),
            lab_result_id: LabResultId::from(lab_result_id),
            candidates: serde_json::from_value(candidates).unwrap_or_default(),
            status: MatchReviewStatus::Pending,
        })
        .collect())
}
