//! Orchestrates the seven ingestion steps of §4.7: admit, rasterize
//! (conditional on the active provider), ocr, sanitize, dedup/persist,
//! trigger mapping — driving a `JobManager` progress record throughout,
//! the same progress-callback shape the reference architecture uses for
//! channel connect/retry notifications.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use tracing::instrument;

use labtrace_core::types::{PatientId, ReportId, ReportStatus};
use labtrace_jobs::{JobManager, JobProgress};
use labtrace_vision::{FallbackProvider, VisionInput};

use crate::admission;
use crate::checksum::sha256_hex;
use crate::content_store::ContentStore;
use crate::dates::parse_test_date;
use crate::error::{IngestError, Result};
use crate::persist;
use crate::sanitize::sanitize;
use crate::types::{IngestionInput, RawExtraction};

/// Invoked once a report's parameter rows are durably persisted, so the
/// mapping engine can pick them up without `labtrace-ingest` depending on
/// `labtrace-mapping` directly.
pub trait MappingTrigger: Send + Sync {
    fn trigger(&self, report_id: ReportId, patient_id: PatientId);
}

pub const VISION_SYSTEM_PROMPT: &str = include_str!("prompts/vision_system.txt");

fn extraction_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["patient_name", "rows"],
        "properties": {
            "patient_name": {"type": "string"},
            "test_date_text": {"type": ["string", "null"]},
            "rows": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["parameter_name"],
                    "properties": {
                        "parameter_name": {"type": "string"},
                        "value_numeric": {"type": ["number", "null"]},
                        "value_text": {"type": ["string", "null"]},
                        "unit": {"type": ["string", "null"]},
                        "reference_lower": {"type": ["number", "null"]},
                        "reference_upper": {"type": ["number", "null"]},
                        "reference_text": {"type": ["string", "null"]},
                        "out_of_range": {"type": ["string", "null"]}
                    }
                }
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(pool, jobs, vision, store, mapping_trigger, input))]
pub async fn run_ingestion(
    job_id: labtrace_core::types::JobId,
    pool: &PgPool,
    jobs: &Arc<JobManager>,
    vision: &FallbackProvider,
    store: &ContentStore,
    mapping_trigger: &dyn MappingTrigger,
    input: IngestionInput,
) -> Result<ReportId> {
    jobs.report_progress(job_id, JobProgress::new(5, "validating upload"));
    admission::admit(&input)?;

    let checksum = sha256_hex(&input.bytes);

    jobs.report_progress(job_id, JobProgress::new(15, "preparing pages for extraction"));
    let (input_for_primary, input_for_secondary) = build_vision_inputs(&input, vision)?;

    jobs.report_progress(job_id, JobProgress::new(35, "extracting parameters"));
    let on_switch = |_primary: &str, _secondary: &str| {
        jobs.report_progress(job_id, JobProgress::new(45, "primary failed, switching to secondary"));
    };
    let raw_value = vision
        .analyze(
            &input_for_primary,
            &input_for_secondary,
            VISION_SYSTEM_PROMPT,
            "Extract every parameter row from this lab report.",
            &extraction_schema(),
            Some(&on_switch),
        )
        .await?;
    let extraction: RawExtraction = serde_json::from_value(raw_value)
        .map_err(|e| IngestError::MalformedPdf(format!("vision output did not match schema: {e}")))?;

    jobs.report_progress(job_id, JobProgress::new(60, "sanitizing extraction"));
    let report_id_placeholder = ReportId::new();
    let sanitized = sanitize(extraction, report_id_placeholder);

    jobs.report_progress(job_id, JobProgress::new(75, "persisting report"));
    let mut tx = pool.begin().await?;

    let patient = persist::upsert_patient(&mut tx, input.owner_user_id, &sanitized.patient_name).await?;

    if let Some(existing) = persist::find_existing_report(&mut tx, patient.id, &checksum).await? {
        tx.commit().await?;
        jobs.complete(job_id, json!({"report_id": existing, "deduped": true}));
        return Ok(existing);
    }

    let storage_path = store
        .store(&checksum, &input.bytes)
        .await
        .map_err(|e| IngestError::Store(e.to_string()))?;

    let report_id = persist::insert_report(
        &mut tx,
        input.owner_user_id,
        patient.id,
        &input.original_filename,
        &input.declared_mime,
        &storage_path,
        &checksum,
        &sanitized.patient_name,
    )
    .await?;

    let rows: Vec<_> = sanitized
        .rows
        .into_iter()
        .map(|mut row| {
            row.report_id = report_id;
            row
        })
        .collect();
    persist::insert_lab_results(&mut tx, &rows).await?;

    let raw_model_output = json!({ "row_count": sanitized.row_count });
    persist::set_report_extraction(
        &mut tx,
        report_id,
        &raw_model_output,
        sanitized.test_date_text.as_deref(),
        sanitized
            .effective_test_date
            .or_else(|| sanitized.test_date_text.as_deref().and_then(parse_test_date)),
    )
    .await?;
    persist::set_report_status(&mut tx, report_id, ReportStatus::Completed).await?;
    persist::touch_patient_last_seen(&mut tx, patient.id).await?;

    tx.commit().await?;

    jobs.report_progress(job_id, JobProgress::new(90, "queuing analyte mapping"));
    mapping_trigger.trigger(report_id, patient.id);

    jobs.complete(
        job_id,
        json!({"report_id": report_id, "patient_id": patient.id, "row_count": rows.len(), "deduped": false}),
    );

    Ok(report_id)
}

/// Rasterizes to PNG pages only when the active primary provider can't
/// accept native PDF; otherwise both legs of the fallback pair see the
/// original bytes (secondary providers always expect images, §4.5).
fn build_vision_inputs(
    input: &IngestionInput,
    vision: &FallbackProvider,
) -> Result<(VisionInput, VisionInput)> {
    if input.declared_mime != "application/pdf" {
        let image = VisionInput::Images(vec![input.bytes.clone()]);
        return Ok((image.clone(), image));
    }

    if vision.primary_needs_rasterized_input() {
        let pages = crate::rasterize::rasterize_pdf(&input.bytes)?;
        let images = VisionInput::Images(pages);
        Ok((images.clone(), images))
    } else {
        let pages = crate::rasterize::rasterize_pdf(&input.bytes)?;
        Ok((VisionInput::NativePdf(input.bytes.clone()), VisionInput::Images(pages)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_patient_name_and_rows() {
        let schema = extraction_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "patient_name"));
        assert!(required.iter().any(|v| v == "rows"));
    }
}
