pub mod admission;
pub mod checksum;
pub mod content_store;
pub mod dates;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod rasterize;
pub mod sanitize;
pub mod types;

pub use content_store::ContentStore;
pub use error::{IngestError, Result};
pub use pipeline::{run_ingestion, MappingTrigger};
pub use types::{IngestionInput, LabResult, Patient, Report};
