pub mod execute_sql;
pub mod fuzzy_search;
pub mod show_plot;
pub mod show_table;

pub use execute_sql::ExecuteSqlTool;
pub use fuzzy_search::FuzzySearchTool;
pub use show_plot::ShowPlotTool;
pub use show_table::ShowTableTool;

use crate::tool::Tool;

/// The four tools exposed to the LLM (§4.9): names are capabilities, not APIs.
pub fn default_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(FuzzySearchTool),
        Box::new(ExecuteSqlTool),
        Box::new(ShowPlotTool),
        Box::new(ShowTableTool),
    ]
}
