pub mod error;
pub mod snapshot;
pub mod types;

pub use error::SchemaError;
pub use snapshot::SchemaCache;
pub use types::{ColumnInfo, SchemaSnapshot, TableManifest};
