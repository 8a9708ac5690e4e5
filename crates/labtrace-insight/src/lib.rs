pub mod error;
pub mod generate;
pub mod query;
pub mod types;

pub use error::{InsightError, Result};
pub use generate::{build_preview_table, generate_insight};
pub use query::{fetch_parameter_rows, MAX_REPORTS};
pub use types::{Insight, ParameterRow};
