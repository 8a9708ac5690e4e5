use sqlx::{Postgres, Transaction};

use labtrace_core::types::{LabResultId, PatientId, ReportId, ReportStatus, UserId};

use crate::error::Result;
use crate::types::{LabResult, Patient, Report};

/// `(patient, checksum)` uniqueness check (§3, §8 dedup idempotence).
pub async fn find_existing_report(
    tx: &mut Transaction<'_, Postgres>,
    patient_id: PatientId,
    checksum: &str,
) -> Result<Option<ReportId>> {
    let row: Option<(uuid::Uuid,)> = sqlx::query_as(
        "SELECT id FROM reports WHERE patient_id = $1 AND content_checksum = $2",
    )
    .bind(patient_id.as_uuid())
    .bind(checksum)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|(id,)| ReportId::from(id)))
}

/// Upsert by `(owner_user_id, normalized full_name)`. A second ingestion
/// for the same patient name must resolve to the same row.
pub async fn upsert_patient(
    tx: &mut Transaction<'_, Postgres>,
    owner_user_id: UserId,
    full_name: &str,
) -> Result<Patient> {
    let normalized = full_name.trim().to_lowercase();

    let existing: Option<Patient> = sqlx::query_as(
        "SELECT id, owner_user_id, full_name, last_seen_report_at
         FROM patients WHERE owner_user_id = $1 AND lower(full_name) = $2",
    )
    .bind(owner_user_id.as_uuid())
    .bind(&normalized)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(patient) = existing {
        return Ok(patient);
    }

    let patient: Patient = sqlx::query_as(
        "INSERT INTO patients (id, owner_user_id, full_name)
         VALUES ($1, $2, $3)
         RETURNING id, owner_user_id, full_name, last_seen_report_at",
    )
    .bind(PatientId::new().as_uuid())
    .bind(owner_user_id.as_uuid())
    .bind(full_name)
    .fetch_one(&mut **tx)
    .await?;

    Ok(patient)
}

pub async fn touch_patient_last_seen(
    tx: &mut Transaction<'_, Postgres>,
    patient_id: PatientId,
) -> Result<()> {
    sqlx::query("UPDATE patients SET last_seen_report_at = now() WHERE id = $1")
        .bind(patient_id.as_uuid())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_report(
    tx: &mut Transaction<'_, Postgres>,
    owner_user_id: UserId,
    patient_id: PatientId,
    source_filename: &str,
    mime_type: &str,
    storage_path: &str,
    checksum: &str,
    patient_name_snapshot: &str,
) -> Result<ReportId> {
    let id = ReportId::new();
    sqlx::query(
        "INSERT INTO reports
            (id, owner_user_id, patient_id, source_filename, mime_type, storage_path,
             content_checksum, status, patient_name_snapshot, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())",
    )
    .bind(id.as_uuid())
    .bind(owner_user_id.as_uuid())
    .bind(patient_id.as_uuid())
    .bind(source_filename)
    .bind(mime_type)
    .bind(storage_path)
    .bind(checksum)
    .bind(ReportStatus::Pending.to_string())
    .bind(patient_name_snapshot)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Transition a report's status. Callers are responsible for honoring the
/// terminal-state guard (§4.7 step 6) — this helper does not re-check.
pub async fn set_report_status(
    tx: &mut Transaction<'_, Postgres>,
    report_id: ReportId,
    status: ReportStatus,
) -> Result<()> {
    sqlx::query("UPDATE reports SET status = $1 WHERE id = $2")
        .bind(status.to_string())
        .bind(report_id.as_uuid())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_report_extraction(
    tx: &mut Transaction<'_, Postgres>,
    report_id: ReportId,
    raw_model_output: &serde_json::Value,
    test_date_text: Option<&str>,
    effective_test_date: Option<chrono::NaiveDate>,
) -> Result<()> {
    sqlx::query(
        "UPDATE reports
         SET raw_model_output = $1, test_date_text = $2, effective_test_date = $3
         WHERE id = $4",
    )
    .bind(raw_model_output)
    .bind(test_date_text)
    .bind(effective_test_date)
    .bind(report_id.as_uuid())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_lab_results(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[LabResult],
) -> Result<Vec<LabResultId>> {
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        let id = LabResultId::new();
        sqlx::query(
            "INSERT INTO lab_results
                (id, report_id, parameter_name_raw, value_numeric, value_text, unit,
                 reference_lower, reference_upper, reference_text, out_of_range)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id.as_uuid())
        .bind(row.report_id.as_uuid())
        .bind(&row.parameter_name_raw)
        .bind(row.value_numeric)
        .bind(&row.value_text)
        .bind(&row.unit)
        .bind(row.reference_lower)
        .bind(row.reference_upper)
        .bind(&row.reference_text)
        .bind(row.out_of_range.to_string())
        .execute(&mut **tx)
        .await?;
        ids.push(id);
    }
    Ok(ids)
}
