use std::sync::RwLock;

use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::SchemaError;
use crate::types::{ColumnInfo, SchemaSnapshot, TableManifest};

/// The queryable surface, as (physical table/view name, semantic aliases a
/// user or LLM is likely to use when asking a question about it).
const ALLOWED_TABLES: &[(&str, &[&str])] = &[
    ("patients", &["patient", "patients"]),
    ("reports", &["report", "reports", "lab report", "lab reports"]),
    (
        "lab_results",
        &["result", "results", "lab result", "lab results", "values"],
    ),
    ("analytes", &["analyte", "analytes", "test", "tests"]),
    ("analyte_aliases", &["alias", "aliases"]),
];

/// Reflects the relational schema into a [`SchemaSnapshot`], caching it
/// until [`SchemaCache::bust`] is called. Rebuilding queries
/// `information_schema.columns` once per allow-listed table.
pub struct SchemaCache {
    cached: RwLock<Option<SchemaSnapshot>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
        }
    }

    #[tracing::instrument(skip(self, pool))]
    pub async fn get_snapshot(&self, pool: &PgPool) -> Result<SchemaSnapshot, SchemaError> {
        if let Some(snap) = self.cached.read().expect("schema cache lock poisoned").clone() {
            return Ok(snap);
        }
        let snap = build_snapshot(pool).await?;
        *self.cached.write().expect("schema cache lock poisoned") = Some(snap.clone());
        Ok(snap)
    }

    /// Force the next `get_snapshot` call to rebuild from the store.
    pub fn bust(&self) {
        *self.cached.write().expect("schema cache lock poisoned") = None;
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

async fn build_snapshot(pool: &PgPool) -> Result<SchemaSnapshot, SchemaError> {
    let mut tables = Vec::with_capacity(ALLOWED_TABLES.len());
    for (physical_name, aliases) in ALLOWED_TABLES {
        let columns: Vec<ColumnInfo> = sqlx::query_as(
            "SELECT column_name, data_type, (is_nullable = 'YES') AS is_nullable
             FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1
             ORDER BY ordinal_position",
        )
        .bind(physical_name)
        .fetch_all(pool)
        .await?;

        tables.push(TableManifest {
            physical_name: physical_name.to_string(),
            semantic_aliases: aliases.iter().map(|s| s.to_string()).collect(),
            columns,
        });
    }

    let manifest_json = serde_json::to_vec(&tables).expect("manifest is always serializable");
    let snapshot_id = hex::encode(Sha256::digest(&manifest_json));

    Ok(SchemaSnapshot { tables, snapshot_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_finds_physical_and_alias() {
        let snap = SchemaSnapshot {
            tables: vec![TableManifest {
                physical_name: "lab_results".to_string(),
                semantic_aliases: vec!["results".to_string()],
                columns: vec![],
            }],
            snapshot_id: "deadbeef".to_string(),
        };
        assert_eq!(snap.resolve("results"), Some("lab_results"));
        assert_eq!(snap.resolve("lab_results"), Some("lab_results"));
        assert_eq!(snap.resolve("unknown"), None);
    }

    #[test]
    fn snapshot_id_is_deterministic_for_equal_input() {
        let tables = vec![TableManifest {
            physical_name: "analytes".to_string(),
            semantic_aliases: vec![],
            columns: vec![],
        }];
        let json_a = serde_json::to_vec(&tables).unwrap();
        let json_b = serde_json::to_vec(&tables).unwrap();
        assert_eq!(hex::encode(Sha256::digest(&json_a)), hex::encode(Sha256::digest(&json_b)));
    }
}
