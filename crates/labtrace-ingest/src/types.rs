use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use labtrace_core::types::{AnalyteId, MappingSource, OutOfRange, PatientId, ReportId, ReportStatus, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: PatientId,
    pub owner_user_id: UserId,
    pub full_name: String,
    pub last_seen_report_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub owner_user_id: UserId,
    pub patient_id: PatientId,
    pub source_filename: String,
    pub mime_type: String,
    pub storage_path: String,
    pub content_checksum: String,
    pub status: ReportStatus,
    pub raw_model_output: Option<serde_json::Value>,
    pub test_date_text: Option<String>,
    pub effective_test_date: Option<NaiveDate>,
    pub patient_name_snapshot: String,
    pub created_at: DateTime<Utc>,
}

/// One row extracted from a report, before and after mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub id: Option<labtrace_core::types::LabResultId>,
    pub report_id: ReportId,
    pub parameter_name_raw: String,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub reference_lower: Option<f64>,
    pub reference_upper: Option<f64>,
    pub reference_text: Option<String>,
    pub out_of_range: OutOfRange,
    pub analyte_id: Option<AnalyteId>,
    pub mapping_confidence: Option<f64>,
    pub mapping_source: Option<MappingSource>,
}

/// Raw shape of one parameter row as extracted (pre-sanitize) from the
/// vision provider's structured JSON output.
#[derive(Debug, Clone, Deserialize)]
pub struct RawParameterRow {
    pub parameter_name: String,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_text: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_lower: Option<f64>,
    #[serde(default)]
    pub reference_upper: Option<f64>,
    #[serde(default)]
    pub reference_text: Option<String>,
    #[serde(default)]
    pub out_of_range: Option<String>,
}

/// The vision provider's full structured-output contract: patient binding,
/// free-form test date, and the parameter rows.
#[derive(Debug, Clone, Deserialize)]
pub struct RawExtraction {
    pub patient_name: String,
    pub test_date_text: Option<String>,
    pub rows: Vec<RawParameterRow>,
}

pub struct IngestionInput {
    pub owner_user_id: UserId,
    pub bytes: Vec<u8>,
    pub declared_mime: String,
    pub original_filename: String,
}

pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/png", "image/jpeg"];
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const MAX_PDF_PAGES: usize = 20;
pub const RASTERIZE_LONG_EDGE_PX: u32 = 1024;
