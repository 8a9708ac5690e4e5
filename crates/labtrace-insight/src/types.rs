use serde::{Deserialize, Serialize};

/// Three-section structured output (§4.11): what's notable, what to do
/// about it, what to keep watching — plus a handful of natural follow-up
/// questions the owner might ask next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub finding: String,
    pub action: String,
    pub tracking: String,
    pub follow_ups: Vec<String>,
}

/// One parameter row pulled in for the insight call and the preview table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ParameterRow {
    pub parameter_name_raw: String,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub out_of_range: String,
    pub test_date_text: Option<String>,
}
