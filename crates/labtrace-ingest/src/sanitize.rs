//! Defensively coerces a vision provider's raw JSON extraction into the
//! canonical shape §4.7 step 4 requires before anything is persisted.

use chrono::NaiveDate;

use crate::dates::parse_test_date;
use crate::types::{LabResult, RawExtraction};
use labtrace_core::types::{OutOfRange, ReportId};

const MAX_STRING_LEN: usize = 512;

pub struct Sanitized {
    pub patient_name: String,
    pub test_date_text: Option<String>,
    pub effective_test_date: Option<NaiveDate>,
    pub rows: Vec<LabResult>,
    pub row_count: usize,
}

pub fn sanitize(extraction: RawExtraction, report_id: ReportId) -> Sanitized {
    let patient_name = normalize_whitespace(&clamp(&extraction.patient_name));
    let test_date_text = extraction.test_date_text.as_deref().map(clamp);
    let effective_test_date = test_date_text.as_deref().and_then(parse_test_date);

    let rows: Vec<LabResult> = extraction
        .rows
        .into_iter()
        .map(|raw| {
            let parameter_name_raw = normalize_whitespace(&clamp(&raw.parameter_name));

            let out_of_range = raw
                .out_of_range
                .as_deref()
                .and_then(|s| s.parse::<OutOfRange>().ok())
                .unwrap_or_default();

            let (value_numeric, value_text) = coerce_value(raw.value_numeric, raw.value_text);

            LabResult {
                id: None,
                report_id,
                parameter_name_raw,
                value_numeric,
                value_text,
                unit: raw.unit.map(|u| clamp(&u)),
                reference_lower: raw.reference_lower,
                reference_upper: raw.reference_upper,
                reference_text: raw.reference_text.map(|t| clamp(&t)),
                out_of_range,
                analyte_id: None,
                mapping_confidence: None,
                mapping_source: None,
            }
        })
        .collect();

    let row_count = rows.len();

    Sanitized {
        patient_name,
        test_date_text,
        effective_test_date,
        rows,
        row_count,
    }
}

fn clamp(s: &str) -> String {
    if s.chars().count() > MAX_STRING_LEN {
        s.chars().take(MAX_STRING_LEN).collect()
    } else {
        s.to_string()
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// If a numeric value is absent but the text value parses as a number,
/// promote it; otherwise keep both as reported.
fn coerce_value(numeric: Option<f64>, text: Option<String>) -> (Option<f64>, Option<String>) {
    match (numeric, &text) {
        (Some(n), _) => (Some(n), text),
        (None, Some(t)) => match t.trim().replace(',', ".").parse::<f64>() {
            Ok(n) => (Some(n), text),
            Err(_) => (None, text),
        },
        (None, None) => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawParameterRow;

    fn row(name: &str, out_of_range: Option<&str>) -> RawParameterRow {
        RawParameterRow {
            parameter_name: name.to_string(),
            value_numeric: None,
            value_text: Some("5.4".to_string()),
            unit: Some("g/dL".to_string()),
            reference_lower: Some(4.0),
            reference_upper: Some(6.0),
            reference_text: None,
            out_of_range: out_of_range.map(|s| s.to_string()),
        }
    }

    #[test]
    fn normalizes_whitespace_and_recomputes_count() {
        let extraction = RawExtraction {
            patient_name: "  Alice   Example ".to_string(),
            test_date_text: Some("2021-06-15".to_string()),
            rows: vec![row("  Hemoglobin  ", Some("within"))],
        };
        let sanitized = sanitize(extraction, ReportId::new());
        assert_eq!(sanitized.patient_name, "Alice Example");
        assert_eq!(sanitized.rows[0].parameter_name_raw, "Hemoglobin");
        assert_eq!(sanitized.row_count, 1);
        assert_eq!(sanitized.rows[0].out_of_range, OutOfRange::Within);
    }

    #[test]
    fn unknown_out_of_range_value_falls_back_to_unknown() {
        let extraction = RawExtraction {
            patient_name: "Bob".to_string(),
            test_date_text: None,
            rows: vec![row("Glucose", Some("nonsense"))],
        };
        let sanitized = sanitize(extraction, ReportId::new());
        assert_eq!(sanitized.rows[0].out_of_range, OutOfRange::Unknown);
    }

    #[test]
    fn coerces_numeric_text_value() {
        let extraction = RawExtraction {
            patient_name: "Bob".to_string(),
            test_date_text: None,
            rows: vec![RawParameterRow {
                parameter_name: "Glucose".to_string(),
                value_numeric: None,
                value_text: Some("5,4".to_string()),
                unit: None,
                reference_lower: None,
                reference_upper: None,
                reference_text: None,
                out_of_range: None,
            }],
        };
        let sanitized = sanitize(extraction, ReportId::new());
        assert_eq!(sanitized.rows[0].value_numeric, Some(5.4));
    }
}
