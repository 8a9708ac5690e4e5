use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Idle session TTL, renewed on every `get()`.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3_600;
/// Completed/failed job records are kept this long before the reaper drops them.
pub const DEFAULT_JOB_TTL_SECS: u64 = 3_600;
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;
/// Rough chars-per-token used by the prompt pruner — matches the informal
/// ~4 chars/token heuristic used for English-dominant clinical text.
pub const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// Top-level config (`labtrace.toml` + `LABTRACE_*` env overrides).
///
/// Built once at boot into an immutable `Arc<LabtraceConfig>` — see §9's
/// "global configuration" design note. No module holds mutable config state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabtraceConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub mapping: MappingConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth_token: Option<String>,
    /// User ids (as UUID strings) granted `UserRole::Admin`. There is no
    /// sign-in flow (out of scope) so the identity asserted by
    /// `X-User-Id` is trusted once the bearer token has gated the
    /// request; this list is what separates an admin caller from any
    /// other — a caller cannot promote itself by setting a header.
    #[serde(default)]
    pub admin_user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Separate connection string/role used for admin-mode reads that must
    /// bypass row-level policies. Falls back to `url` when unset (the
    /// admin role distinction is then enforced purely by the `admin_mode`
    /// flag passed into the query layer, not by connection identity).
    pub admin_url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            admin_url: None,
            max_connections: default_pool_size(),
        }
    }
}

/// Mapping-engine thresholds (§4.8). All three must satisfy
/// `0.0 <= QUEUE_LOWER <= AUTO_ACCEPT <= 1.0`; `load()` validates this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default = "default_auto_accept")]
    pub auto_accept: f64,
    #[serde(default = "default_queue_lower")]
    pub queue_lower: f64,
    #[serde(default = "default_backfill_threshold")]
    pub backfill_threshold: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            auto_accept: default_auto_accept(),
            queue_lower: default_queue_lower(),
            backfill_threshold: default_backfill_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub vision_primary: VisionProviderConfig,
    pub vision_secondary: VisionProviderConfig,
    /// API key for the single Anthropic provider backing chat, insight
    /// generation, and the mapping engine's LLM tier.
    pub anthropic_api_key: String,
    pub chat_model: String,
    pub insight_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionProviderConfig {
    /// One of `anthropic` | `openai` — selects the adapter implementation.
    pub kind: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_vision_max_bytes")]
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
        }
    }
}

/// Where `ContentStore` writes ingested report bytes, content-addressed by
/// checksum (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_content_root")]
    pub content_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { content_root: default_content_root() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_job_ttl")]
    pub ttl_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_job_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "default_retained_messages")]
    pub retained_messages: usize,
    /// When false, `execute_sql` is never required to bind a patient filter
    /// even if the session has a selected patient. Exists for single-patient
    /// deployments; defaults on.
    #[serde(default = "bool_true")]
    pub enforce_patient_scope: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            token_budget: default_token_budget(),
            retained_messages: default_retained_messages(),
            enforce_patient_scope: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_database_url() -> String {
    "postgres://localhost/labtrace".to_string()
}
fn default_pool_size() -> u32 {
    10
}
fn default_content_root() -> String {
    "./data/reports".to_string()
}
fn default_auto_accept() -> f64 {
    0.90
}
fn default_queue_lower() -> f64 {
    0.65
}
fn default_backfill_threshold() -> f64 {
    0.80
}
fn default_vision_max_bytes() -> usize {
    20 * 1024 * 1024
}
fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}
fn default_job_ttl() -> u64 {
    DEFAULT_JOB_TTL_SECS
}
fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}
fn default_token_budget() -> usize {
    80_000
}
fn default_retained_messages() -> usize {
    20
}

impl LabtraceConfig {
    /// Load config from a TOML file with `LABTRACE_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `./labtrace.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or("labtrace.toml");

        let config: LabtraceConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("LABTRACE_").split("__"))
            .extract()
            .map_err(|e| crate::error::ErrorKind::Validation(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        let m = &self.mapping;
        if !(0.0..=1.0).contains(&m.auto_accept)
            || !(0.0..=1.0).contains(&m.queue_lower)
            || m.queue_lower > m.auto_accept
        {
            return Err(crate::error::ErrorKind::Validation(format!(
                "mapping thresholds out of order: queue_lower={} auto_accept={}",
                m.queue_lower, m.auto_accept
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_thresholds() {
        let cfg = LabtraceConfig {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth_token: None,
                admin_user_ids: Vec::new(),
            },
            database: DatabaseConfig::default(),
            mapping: MappingConfig {
                auto_accept: 0.5,
                queue_lower: 0.9,
                backfill_threshold: 0.8,
            },
            providers: ProvidersConfig {
                vision_primary: VisionProviderConfig {
                    kind: "anthropic".into(),
                    api_key: "k".into(),
                    model: "m".into(),
                    max_payload_bytes: 1024,
                },
                vision_secondary: VisionProviderConfig {
                    kind: "openai".into(),
                    api_key: "k".into(),
                    model: "m".into(),
                    max_payload_bytes: 1024,
                },
                anthropic_api_key: "k".into(),
                chat_model: "m".into(),
                insight_model: "m".into(),
            },
            session: SessionConfig::default(),
            jobs: JobsConfig::default(),
            chat: ChatConfig::default(),
            storage: StorageConfig::default(),
        };
        assert!(cfg.validate().is_err());
    }
}
