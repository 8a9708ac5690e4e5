use serde::{Deserialize, Serialize};

/// One column of a reflected table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
}

/// One reflected table/view plus the hand-maintained aliases callers know it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableManifest {
    pub physical_name: String,
    pub semantic_aliases: Vec<String>,
    pub columns: Vec<ColumnInfo>,
}

/// Compact, cacheable description of the queryable surface, injected into
/// the chat system prompt and used by the SQL validator to resolve
/// identifiers (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableManifest>,
    /// `sha256` of the canonicalized manifest JSON, hex-encoded.
    pub snapshot_id: String,
}

impl SchemaSnapshot {
    pub fn manifest_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.tables).expect("manifest is always serializable")
    }

    /// Every physical table name this snapshot knows about, for the SQL
    /// validator's identifier-resolution pass.
    pub fn physical_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.physical_name.as_str()).collect()
    }

    /// Resolve a semantic alias (or physical name passed through unchanged)
    /// to its physical table name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.tables.iter().find_map(|t| {
            if t.physical_name == name || t.semantic_aliases.iter().any(|a| a == name) {
                Some(t.physical_name.as_str())
            } else {
                None
            }
        })
    }
}
