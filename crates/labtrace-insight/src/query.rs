use sqlx::PgPool;

use labtrace_core::types::{PatientId, ReportId};

use crate::error::Result;
use crate::types::ParameterRow;

/// Upper bound on how many of the caller-supplied report ids are used,
/// even if more are passed in (§4.11: "capped, e.g., <=20").
pub const MAX_REPORTS: usize = 20;

pub async fn fetch_parameter_rows(
    pool: &PgPool,
    patient_id: PatientId,
    report_ids: &[ReportId],
) -> Result<Vec<ParameterRow>> {
    let capped: Vec<uuid::Uuid> = report_ids.iter().take(MAX_REPORTS).map(|id| id.as_uuid()).collect();

    let rows: Vec<ParameterRow> = sqlx::query_as(
        "SELECT lr.parameter_name_raw, lr.value_numeric, lr.value_text, lr.unit,
                lr.out_of_range::text AS out_of_range, r.test_date_text
         FROM lab_results lr
         JOIN reports r ON r.id = lr.report_id
         WHERE r.patient_id = $1 AND r.id = ANY($2)
         ORDER BY r.effective_test_date DESC NULLS LAST, lr.parameter_name_raw",
    )
    .bind(patient_id.as_uuid())
    .bind(&capped)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
