//! Wires `labtrace_ingest::MappingTrigger` to `labtrace_mapping::map_result`
//! without `labtrace-ingest` depending on `labtrace-mapping` directly (§4.7
//! step 6). `trigger` itself is synchronous — the pipeline calls it
//! immediately after committing the ingestion transaction — so it spawns the
//! actual mapping sweep as a detached task rather than blocking the caller.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{error, info, instrument};

use labtrace_core::config::MappingConfig;
use labtrace_core::types::{PatientId, ReportId};
use labtrace_ingest::MappingTrigger;
use labtrace_llm::LlmProvider;

pub struct MappingSweep {
    pub pool: PgPool,
    pub provider: Arc<dyn LlmProvider>,
    pub chat_model: String,
    pub mapping_config: MappingConfig,
}

impl MappingTrigger for MappingSweep {
    fn trigger(&self, report_id: ReportId, patient_id: PatientId) {
        let pool = self.pool.clone();
        let provider = self.provider.clone();
        let chat_model = self.chat_model.clone();
        let config = self.mapping_config.clone();
        tokio::spawn(run_sweep(pool, provider, chat_model, config, report_id, patient_id));
    }
}

#[instrument(skip(pool, provider, chat_model, config))]
async fn run_sweep(
    pool: PgPool,
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    config: MappingConfig,
    report_id: ReportId,
    patient_id: PatientId,
) {
    let unmapped = match labtrace_mapping::list_unmapped_for_report(&pool, report_id).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(report_id = %report_id, error = %e, "failed to list unmapped results for report");
            return;
        }
    };

    info!(report_id = %report_id, patient_id = %patient_id, count = unmapped.len(), "running post-ingestion mapping sweep");

    for (lab_result_id, raw_parameter) in unmapped {
        if let Err(e) = labtrace_mapping::map_result(&pool, provider.as_ref(), &chat_model, &config, lab_result_id, &raw_parameter).await {
            error!(lab_result_id = %lab_result_id, error = %e, "mapping failed for result");
        }
    }
}
